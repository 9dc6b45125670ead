//! System prompts for the main agent and the research subagent.

/// Core prompt, loaded from `core.md` at compile time.
pub const CORE_PROMPT: &str = include_str!("core.md");

/// Prompt for the nested read-only research agent.
pub const RESEARCH_PROMPT: &str = "You are a codebase research assistant with read-only tools. \
Investigate only what the question needs, quote file paths and line numbers for every claim, \
and finish with a concise summary of your findings and no tool calls.";

/// Append the working directory and, when set, the completion marker hint.
pub fn build_system_prompt(base: &str, working_directory: &str, completion_marker: &str) -> String {
    let mut prompt = format!("{base}\n\nCurrent working directory: {working_directory}");
    if !completion_marker.trim().is_empty() {
        prompt.push_str(&format!(
            "\nYou may start the final line of your summary with `{}`.",
            completion_marker.trim()
        ));
    }
    prompt
}
