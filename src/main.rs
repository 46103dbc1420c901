use std::io::{self, Write};

use log::info;

use quartzdb::types::Fields;
use quartzdb::{Engine, ExecResult};

const DATA_DIR: &str = "quartz_data";
const DEFAULT_DATABASE: &str = "main";

fn main() -> io::Result<()> {
    env_logger::init();
    info!("quartzdb starting, data under '{}'", DATA_DIR);

    let mut engine = match Engine::with_manager(DATA_DIR, DEFAULT_DATABASE) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("failed to open data directory: {err}");
            return Ok(());
        }
    };

    println!("quartzdb. Statements end with ';'. Type .exit to quit.");

    let mut buffer = String::new();
    loop {
        if buffer.trim().is_empty() {
            let db = engine.current_database().unwrap_or("?");
            print!("{db}> ");
        } else {
            print!("   ...> ");
        }
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // dot-commands only apply outside a pending statement
        if buffer.trim().is_empty() && trimmed.starts_with('.') {
            if !run_dot_command(&mut engine, trimmed) {
                break;
            }
            continue;
        }

        buffer.push_str(&line);
        while let Some(pos) = buffer.find(';') {
            let stmt: String = buffer.drain(..=pos).collect();
            let stmt = stmt.trim_end_matches(';').trim().to_string();
            if !stmt.is_empty() {
                render(engine.execute(&stmt));
            }
        }
    }

    info!("quartzdb shutting down");
    Ok(())
}

/// Returns false when the REPL should exit.
fn run_dot_command(engine: &mut Engine, command: &str) -> bool {
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    match name {
        ".exit" | ".quit" => return false,
        ".tables" => render(engine.execute("SHOW TABLES")),
        ".schema" => {
            if rest.is_empty() {
                println!("usage: .schema <table>");
            } else {
                match engine.storage().table(rest) {
                    Ok(table) => println!("{table}"),
                    Err(err) => println!("error: {err}"),
                }
            }
        }
        ".explain" => {
            if rest.is_empty() {
                println!("usage: .explain <select statement>");
            } else {
                match engine.explain(rest.trim_end_matches(';')) {
                    Ok(plan) => print!("{plan}"),
                    Err(err) => println!("error: {err}"),
                }
            }
        }
        _ => println!("unknown command: {name}"),
    }
    true
}

fn render(result: ExecResult) {
    match result {
        ExecResult::Ok { message, .. } => println!("{message}"),
        ExecResult::Err { error } => println!("error: {error}"),
        ExecResult::Rows { rows, count } => {
            print_rows(&rows);
            println!("{count} row(s)");
        }
    }
}

/// Renders rows as an aligned text table. Column order follows the first
/// row; rows missing a column print an empty cell.
fn print_rows(rows: &[Fields]) {
    let Some(first) = rows.first() else {
        return;
    };
    let headers: Vec<String> = first.iter().map(|(name, _)| name.to_string()).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    let mut cells: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut line = Vec::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            let text = row
                .get(header)
                .map(|v| v.to_string())
                .unwrap_or_default();
            if text.len() > widths[i] {
                widths[i] = text.len();
            }
            line.push(text);
        }
        cells.push(line);
    }
    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{h:<w$}"))
        .collect();
    println!("{}", header_line.join(" | "));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", rule.join("-+-"));
    for line in cells {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect();
        println!("{}", padded.join(" | "));
    }
}
