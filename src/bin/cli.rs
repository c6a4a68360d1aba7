//! RowDB - CLI Client

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rowdb::catalog::TableInfo;
use rowdb::sql::{parse_statement, Request, StatementBuffer};
use rowdb::{EngineConfig, ExecutionEngine, QueryResult, ResultRows};

/// Print help message
fn print_help() {
    println!(
        r#"
Requests:
  CREATE TABLE <name>                 then ADD <field> <char|int> [len] ... END
  INSERT INTO <table> <v1>, <v2>, ...
  SELECT <f1>, <f2>, ...              then FROM <t1>, <t2>, ...
                                      [WHERE|AND|OR <a> = <b>] ... END
  CREATE INDEX <name> USING <c1>, ... then FROM <table> END
  SHOW <table>
  QUIT
"#
    );
}

#[derive(Debug, Default)]
struct Options {
    data_dir: Option<PathBuf>,
    json: bool,
}

fn parse_args() -> Result<Options> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" | "-d" => {
                let dir = args
                    .get(i + 1)
                    .context("--data-dir needs a directory")?;
                options.data_dir = Some(PathBuf::from(dir));
                i += 1;
            }
            "--json" => options.json = true,
            "--help" | "-h" => {
                println!("usage: rowdb [--data-dir <dir>] [--json]");
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
        i += 1;
    }
    Ok(options)
}

fn print_rows(rows: ResultRows, json: bool) -> Result<()> {
    if json {
        let columns = rows.columns().to_vec();
        for row in rows {
            let object: serde_json::Map<String, serde_json::Value> = columns
                .iter()
                .cloned()
                .zip(row?.into_iter().map(serde_json::Value::String))
                .collect();
            println!("{}", serde_json::Value::Object(object));
        }
        return Ok(());
    }
    for row in rows {
        println!("{}", row?.join(","));
    }
    Ok(())
}

fn print_table(info: &TableInfo, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(info)?);
        return Ok(());
    }
    println!("Table: {}", info.name);
    println!("Row size: {}", info.row_size);
    for field in &info.fields {
        println!(
            "{}\t{}({})",
            field.name, field.field_type, field.declared_length
        );
    }
    Ok(())
}

/// Parse and run one complete statement; returns false on QUIT
fn execute_statement(statement: &str, engine: &mut ExecutionEngine, json: bool) -> Result<bool> {
    let request = parse_statement(statement)?;
    if request == Request::Quit {
        return Ok(false);
    }
    match engine.execute(request)? {
        QueryResult::Rows(rows) => print_rows(rows, json)?,
        QueryResult::Table(info) => print_table(&info, json)?,
        QueryResult::Done(message) => {
            if !json {
                println!("{}", message);
            }
        }
    }
    Ok(true)
}

/// Main REPL loop
fn run_repl(engine: &mut ExecutionEngine, json: bool) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut buffer = StatementBuffer::new();

    loop {
        let prompt = if buffer.is_pending() { "...> " } else { "rowdb> " };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        if !buffer.is_pending() && line.trim() == ".help" {
            print_help();
            continue;
        }

        let Some(statement) = buffer.push_line(&line) else {
            continue;
        };
        if let Err(e) = editor.add_history_entry(statement.as_str()) {
            debug!(error = %e, "history entry not recorded");
        }

        match execute_statement(&statement, engine, json) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args()?;
    let mut config = EngineConfig::from_env();
    if let Some(dir) = options.data_dir {
        config = config.data_dir(dir);
    }

    let mut engine = ExecutionEngine::new(config).context("failed to open data directory")?;
    run_repl(&mut engine, options.json)
}
