use anyhow::Result;
use std::io::{BufRead, Write};
use tokio::runtime::Runtime;

use crate::core::agent::{ChatAgent, Command, Turn};

fn print_banner<W: Write>(output: &mut W) -> Result<()> {
    writeln!(output, "=== Chatbot ===")?;
    writeln!(output, "Special commands:")?;
    writeln!(output, " - 'buscar <word>': search the knowledge file")?;
    writeln!(output, " - 'openai <question>': ask OpenAI")?;
    writeln!(output, " - 'adios': quit")?;
    Ok(())
}

/// Read-eval-print loop. Each line is handled completely before the next is read.
///
/// Returns after `adios` or when the input ends.
pub fn run<R: BufRead, W: Write>(
    agent: &ChatAgent,
    runtime: &Runtime,
    mut input: R,
    mut output: W,
) -> Result<()> {
    print_banner(&mut output)?;

    let mut buf = Vec::new();
    loop {
        write!(output, "\nYou: ")?;
        output.flush()?;

        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            log::info!("Input closed");
            writeln!(output)?;
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.strip_suffix('\n').unwrap_or(&line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        let command = Command::parse(line);
        if let Command::Remote(_) = command {
            writeln!(output, "Querying OpenAI...")?;
            output.flush()?;
        }

        match runtime.block_on(agent.respond(command)) {
            Turn::Continue(lines) => {
                for line in lines {
                    writeln!(output, "{}", line)?;
                }
            }
            Turn::Exit(farewell) => {
                writeln!(output, "{}", farewell)?;
                break;
            }
        }
    }
    Ok(())
}
