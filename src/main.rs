// ulogic: featherweight business-rule expressions and templates.
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

use std::fs;
use std::process::exit;

use clap::Parser;

use ulogic::template::Template;
use ulogic::value::Value;
use ulogic::vm::{Env, Interpreter};


#[derive(Parser)]
#[command(name = "ulogic", version, about = "Business-rule expressions and templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}


#[derive(clap::Subcommand)]
enum Command {
    /// Parse or evaluate an expression
    Eval {
        /// Expression source, or the path of a file containing it
        expression: String,
        #[command(flatten)]
        opts: Opts,
    },
    /// Parse or render a template
    Render {
        /// Template source, or the path of a file containing it
        template: String,
        #[command(flatten)]
        opts: Opts,
    },
}


#[derive(clap::Args)]
struct Opts {
    /// Bind a variable; VALUE may also be a JSON file
    #[arg(short = 'v', long = "var", num_args = 2, value_names = ["VAR", "VALUE"], action = clap::ArgAction::Append)]
    var: Vec<String>,

    /// Import the process environment into the bindings
    #[arg(short, long)]
    environment: bool,

    /// Execute instead of dumping the AST
    #[arg(short, long)]
    run: bool,

    /// Print the parsed source and bindings
    #[arg(short = 'D', long)]
    debug: bool,
}


fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Eval { expression, opts } => {
            let source = read_source(&expression);
            let mut env = bindings(&opts);

            if opts.debug {
                println!("expr {:?}", source);
                println!("vars {:?}", env);
            }

            let ast = match ulogic::parser::parse(&source) {
                Ok(ast) => ast,
                Err(e) => {
                    eprintln!("{}", e);
                    exit(1);
                }
            };

            if opts.debug {
                print!("{}", ast.dump());
            }

            if opts.run {
                match Interpreter::new().run(&ast, &mut env) {
                    Ok(value) => println!("{}", value),
                    Err(e) => {
                        eprintln!("{}", e);
                        exit(1);
                    }
                }
            } else if !opts.debug {
                print!("{}", ast.dump());
            }
        }

        Command::Render { template, opts } => {
            let source = read_source(&template);
            let mut env = bindings(&opts);

            if opts.debug {
                println!("expr {:?}", source);
                println!("vars {:?}", env);
            }

            let template = match Template::new(&source) {
                Ok(template) => template,
                Err(e) => {
                    eprintln!("{}", e);
                    exit(1);
                }
            };

            if opts.run {
                match template.render(&mut env) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("{}", e);
                        exit(1);
                    }
                }
            } else {
                print!("{}", template.ast().dump());
            }
        }
    }
}


// The positional argument may name a readable file; otherwise it is the
// source itself.
fn read_source(arg: &str) -> String {
    fs::read_to_string(arg).unwrap_or_else(|_| String::from(arg))
}


fn bindings(opts: &Opts) -> Env {
    let mut env = Env::new();

    if opts.environment {
        for (name, value) in std::env::vars() {
            env.insert(name, Value::optimized(&value));
        }
    }

    for pair in opts.var.chunks(2) {
        let (name, raw) = (&pair[0], &pair[1]);

        // a readable VALUE is parsed as JSON; a JSON error binds None; an
        // unreadable path binds the literal string
        let value = match fs::read_to_string(raw) {
            Ok(content) => match serde_json::from_str::<serde_json::Value>(&content) {
                Ok(json) => json_value(&json),
                Err(_) => Value::None,
            },
            Err(_) => Value::optimized(raw),
        };

        env.insert(name.clone(), value);
    }

    env
}


fn json_value(json: &serde_json::Value) -> Value {
    use ulogic::value::{Dict, Key};

    match json {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::float(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Value::optimized(s),
        serde_json::Value::Array(items) => {
            Value::list(items.iter().map(json_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let dict: Dict =
                entries.iter().map(|(k, v)| (Key::str(k), json_value(v))).collect();
            Value::dict(dict)
        }
    }
}
