//! The `ask` and `chat` commands.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use docqa_core::Answer;

use crate::config::Config;
use crate::ingest::build_session;

/// Render an answer followed by its sources, one per line.
pub fn render_answer(answer: &Answer) -> String {
    let mut out = answer.message().to_string();
    let sources = answer.sources();
    if !sources.is_empty() {
        out.push_str("\n\nSources:");
        for source in sources {
            out.push_str(&format!(
                "\n- {}, chunk {}, distance {:.4}",
                source.metadata.file_name, source.metadata.chunk_index, source.distance
            ));
        }
    }
    out
}

pub fn answer_json(question: &str, answer: &Answer) -> serde_json::Value {
    serde_json::json!({
        "question": question,
        "message": answer.message(),
        "answer": answer,
    })
}

/// `docqa ask`: index `docs`, answer one question.
pub async fn run_ask(config: &Config, docs: &[PathBuf], question: &str, json: bool) -> Result<()> {
    let session = build_session(config, docs).await?;
    let answer = session.ask(question).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&answer_json(question, &answer))?
        );
    } else {
        println!("{}", render_answer(&answer));
    }
    Ok(())
}

/// `docqa chat`: index once, then answer one question per stdin line.
pub async fn run_chat(config: &Config, docs: &[PathBuf]) -> Result<()> {
    let session = build_session(config, docs).await?;
    let interactive = atty::is(atty::Stream::Stdin);

    if interactive {
        let files = session.indexed_files();
        eprintln!(
            "Indexed {} chunks from {} file(s): {}",
            session.index().len(),
            files.len(),
            files.join(", ")
        );
        eprintln!("Ask a question (Ctrl-D to quit).");
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            eprint!("> ");
            std::io::stderr().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let question = line?;
        let answer = session.ask(&question).await;
        writeln!(stdout, "{}\n", render_answer(&answer))?;
        stdout.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::{ChunkMetadata, RetrievalResult, FALLBACK_MESSAGE};

    #[test]
    fn test_render_generated_with_sources() {
        let answer = Answer::Generated {
            text: "Within 30 days.".into(),
            sources: vec![RetrievalResult {
                text: "Refunds within 30 days.".into(),
                metadata: ChunkMetadata {
                    file_name: "policy.pdf".into(),
                    chunk_index: 2,
                },
                distance: 0.25,
            }],
        };
        assert_eq!(
            render_answer(&answer),
            "Within 30 days.\n\nSources:\n- policy.pdf, chunk 2, distance 0.2500"
        );
    }

    #[test]
    fn test_render_abstained_has_no_sources() {
        assert_eq!(render_answer(&Answer::Abstained), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_json_shape() {
        let json = answer_json("why?", &Answer::Failed {
            message: "Generation error: timeout".into(),
        });
        assert_eq!(json["question"], "why?");
        assert_eq!(json["message"], "Generation error: timeout");
        assert_eq!(json["answer"]["status"], "failed");
    }
}
