//! # Script REPL
//!
//! Evaluates scripts locally through the same pipeline the server uses.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin scripteval
//! ```
//!
//! Then enter scripts or commands:
//! - `.load <file>` - Load a JSON request (`{ "header": ..., "batches": [...] }`)
//! - `.return string|numeric` - Select the return type
//! - `.quit` - Exit

use std::fs;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use scripteval::protocol::rest::dto::EvaluateScriptRequest;
use scripteval::protocol::{BundledRows, DataType, Parameter, ScriptRequestHeader};
use scripteval::{CallContext, Config, Handler};

const HELP: &str = "Commands:
  .load <file>             - Load params and rows from a JSON request
  .return string|numeric   - Select the return type
  .show                    - Show the loaded params and row count
  .help                    - Show this help
  .quit                    - Exit

Any other line is evaluated as a script; `args` holds the loaded columns.";

struct ReplState {
    handler: Handler,
    params: Vec<Parameter>,
    batches: Vec<BundledRows>,
    return_type: DataType,
}

impl ReplState {
    fn load(&mut self, path: &str) -> Result<(), String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read '{path}': {e}"))?;
        let request: EvaluateScriptRequest =
            serde_json::from_str(&content).map_err(|e| format!("Invalid request JSON: {e}"))?;
        self.params = request.header.params;
        self.batches = request.batches;
        if request.header.return_type.is_recognized() {
            self.return_type = request.header.return_type;
        }
        Ok(())
    }

    fn row_count(&self) -> usize {
        self.batches.iter().map(BundledRows::len).sum()
    }

    fn evaluate(&self, script: &str) -> Result<BundledRows, String> {
        let mut header = ScriptRequestHeader::new(script, self.return_type);
        header.params.clone_from(&self.params);
        let mut ctx = CallContext::new();
        self.handler
            .evaluate_blocking(&header, self.batches.clone(), &mut ctx)
            .map_err(|e| format!("{}: {e}", ctx.code()))
    }
}

fn main() -> anyhow::Result<()> {
    println!("ScriptEval REPL");
    println!("===============\n");
    println!("{HELP}\n");

    let config = Config::load().unwrap_or_default();
    let mut state = ReplState {
        handler: Handler::from_config(&config),
        params: Vec::new(),
        batches: Vec::new(),
        return_type: DataType::Numeric,
    };

    let mut rl = DefaultEditor::new()?;
    loop {
        let line = match rl.readline("script> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        if input == ".quit" || input == ".exit" {
            break;
        }

        if input == ".help" {
            println!("{HELP}");
            continue;
        }

        if input == ".show" {
            for param in &state.params {
                println!("  {} : {}", param.name, param.data_type);
            }
            println!("{} rows, return type {}", state.row_count(), state.return_type);
            continue;
        }

        if let Some(path) = input.strip_prefix(".load") {
            match state.load(path.trim()) {
                Ok(()) => println!(
                    "Loaded {} params, {} rows",
                    state.params.len(),
                    state.row_count()
                ),
                Err(e) => println!("Error: {e}"),
            }
            continue;
        }

        if let Some(kind) = input.strip_prefix(".return") {
            match kind.trim() {
                "string" => state.return_type = DataType::String,
                "numeric" => state.return_type = DataType::Numeric,
                other => println!("Unknown return type '{other}', expected string|numeric"),
            }
            continue;
        }

        if input.starts_with('.') {
            println!("Unknown command: {input}");
            println!("Type .help for available commands");
            continue;
        }

        match state.evaluate(input) {
            Ok(batch) => print_batch(&batch),
            Err(e) => println!("Error: {e}"),
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_batch(batch: &BundledRows) {
    for row in &batch.rows {
        let cells: Vec<String> = row
            .duals
            .iter()
            .map(|d| {
                if d.str_data.is_empty() {
                    d.num_data.to_string()
                } else {
                    format!("{:?}", d.str_data)
                }
            })
            .collect();
        println!("  {}", cells.join("\t"));
    }
    println!("({} rows)", batch.len());
}
