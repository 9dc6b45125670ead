//! Interactive confirmation on stderr/stdin.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use tide_runtime::{ConfirmHandler, ConfirmResponse, ConfirmationRequest};
use tracing::warn;

/// Asks the user about each gated call.
///
/// `y` approves, `a` approves and skips future prompts for the tool, `n`
/// rejects (a second line carries optional guidance), `q` aborts the turn.
/// End of input aborts.
pub struct StdinConfirm;

/// Map an answer line to a response. `None` means the answer was not
/// understood and the question should be repeated.
pub fn parse_choice(choice: &str) -> Option<ConfirmResponse> {
    match choice.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(ConfirmResponse::Approve),
        "a" | "always" => Some(ConfirmResponse::ApproveAlways),
        "n" | "no" => Some(ConfirmResponse::Reject { guidance: None }),
        "q" | "quit" | "abort" => Some(ConfirmResponse::Abort),
        _ => None,
    }
}

fn describe(request: &ConfirmationRequest) -> String {
    let args = serde_json::to_string(&request.arguments).unwrap_or_default();
    let args = if args.chars().count() > 200 {
        format!("{}...", args.chars().take(200).collect::<String>())
    } else {
        args
    };
    format!("{} {args}", request.tool_name)
}

fn read_line() -> Option<String> {
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

fn ask(prompt: &str) -> Option<String> {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{prompt}");
    let _ = stderr.flush();
    read_line()
}

fn ask_blocking(description: &str) -> ConfirmResponse {
    loop {
        let Some(answer) = ask(&format!("\nRun {description}?\n[y]es / [a]lways / [n]o / [q]uit: ")) else {
            return ConfirmResponse::Abort;
        };
        match parse_choice(&answer) {
            Some(ConfirmResponse::Reject { .. }) => {
                let guidance = ask("Guidance for the model (empty for none): ")
                    .map(|g| g.trim().to_string())
                    .filter(|g| !g.is_empty());
                return ConfirmResponse::Reject { guidance };
            }
            Some(response) => return response,
            None => {}
        }
    }
}

#[async_trait]
impl ConfirmHandler for StdinConfirm {
    async fn confirm(&self, request: &ConfirmationRequest) -> ConfirmResponse {
        let description = describe(request);
        match tokio::task::spawn_blocking(move || ask_blocking(&description)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "confirmation prompt failed");
                ConfirmResponse::Abort
            }
        }
    }
}
