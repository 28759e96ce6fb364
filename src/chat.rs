use sift_core::{EngineError, QueryRequest, RagEngine, ResponseMode};
use sift_llm::{LlmProvider, Message};
use sift_search::SearchProvider;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Messages kept as conversation history.
const HISTORY_LIMIT: usize = 20;

const HELP: &str = "commands: /web toggles forced web search, /mode [detailed|concise], \
                    /clear resets history, /quit exits";

enum Input {
    Quit,
    Clear,
    ToggleWeb,
    Mode(Option<String>),
    Query(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    match parts.next() {
        Some("/quit" | "/exit") => Input::Quit,
        Some("/clear") => Input::Clear,
        Some("/web") => Input::ToggleWeb,
        Some("/mode") => Input::Mode(parts.next().map(|m| m.trim().to_owned())),
        _ => Input::Query(line.to_owned()),
    }
}

pub async fn run<P: LlmProvider, S: SearchProvider>(
    engine: &RagEngine<P, S>,
    mut mode: ResponseMode,
    mut force_web: bool,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut history: Vec<Message> = Vec::new();
    println!("{HELP}");

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Clear => {
                history.clear();
                println!("history cleared");
            }
            Input::ToggleWeb => {
                force_web = !force_web;
                println!("forced web search {}", if force_web { "on" } else { "off" });
            }
            Input::Mode(None) => println!("mode: {mode}"),
            Input::Mode(Some(value)) => match value.parse::<ResponseMode>() {
                Ok(m) => {
                    mode = m;
                    println!("mode: {mode}");
                }
                Err(e) => println!("{e}"),
            },
            Input::Query(query) => {
                let request = QueryRequest::new(query.clone())
                    .with_web_search(force_web)
                    .with_mode(mode)
                    .with_history(history.clone());
                match engine.ask(&request).await {
                    Ok(answer) => {
                        println!("\n[{}]\n{}\n", answer.label(), answer.text);
                        history.push(Message::user(query));
                        history.push(Message::assistant(answer.text));
                        if history.len() > HISTORY_LIMIT {
                            history.drain(..history.len() - HISTORY_LIMIT);
                        }
                    }
                    Err(e @ (EngineError::NoContextAvailable | EngineError::Generation(_))) => {
                        println!("error: {e}");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert!(matches!(parse_input("/quit"), Input::Quit));
        assert!(matches!(parse_input("  /clear "), Input::Clear));
        assert!(matches!(parse_input("/web"), Input::ToggleWeb));
        assert!(matches!(parse_input("/mode"), Input::Mode(None)));
        assert!(matches!(parse_input("/mode concise"), Input::Mode(Some(m)) if m == "concise"));
        assert!(matches!(parse_input("   "), Input::Empty));
        assert!(matches!(parse_input("what is the refund window?"), Input::Query(_)));
    }
}
