mod db;
mod export;
mod ipc;
mod process;
mod query;

use std::io::{self, BufRead, Write};

fn serve(input: impl BufRead, mut output: impl Write) -> io::Result<()> {
    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // Salvage the id where possible so the caller can still
                // match the reply to its request.
                let id = serde_json::from_str::<serde_json::Value>(&line)
                    .ok()
                    .and_then(|v| {
                        v.get("id")
                            .and_then(|i| i.as_str())
                            .map(|s| s.to_string())
                    })
                    .unwrap_or_default();
                ipc::bad_request(&id, &e.to_string())
            }
        };
        writeln!(output, "{}", resp)?;
        output.flush()?;
    }
    Ok(())
}

fn main() {
    let stdin = io::stdin();
    let stdout = io::stdout();
    if serve(stdin.lock(), stdout.lock()).is_err() {
        std::process::exit(1);
    }
}
