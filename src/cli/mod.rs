//! Command surface for the `sms` binary. Every command drives the HTTP
//! API through [`ApiClient`]; nothing here touches the stores directly.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::client::{ApiClient, ClientError};
use crate::types::Student;

#[derive(Parser)]
#[command(name = "sms")]
#[command(about = "Student management CLI for the student-api server")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "STUDENT_API_URL",
        default_value = "http://localhost:3001",
        help = "Base URL of the API server"
    )]
    pub server: String,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Log in and print the session token")]
    Login {
        email: String,
        password: String,
    },

    #[command(about = "Show the authenticated account")]
    Whoami,

    #[command(about = "End the session server-side")]
    Logout,

    #[command(about = "Student record operations")]
    Students {
        #[command(subcommand)]
        cmd: StudentCommands,
    },
}

#[derive(Subcommand)]
pub enum StudentCommands {
    #[command(about = "List students, one page at a time")]
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "")]
        status: String,
        #[arg(long, default_value = "")]
        grade: String,
    },

    #[command(about = "Fetch a single student by id")]
    Get { id: String },

    #[command(about = "Create a student from a JSON body (inline or @file)")]
    Create { body: String },

    #[command(about = "Apply a partial update from a JSON body (inline or @file)")]
    Update { id: String, body: String },

    #[command(about = "Delete a student")]
    Delete { id: String },

    #[command(about = "Bulk import students from a CSV file")]
    Import { file: PathBuf },

    #[command(about = "Export the filtered set as CSV")]
    Export {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "")]
        status: String,
        #[arg(long, default_value = "")]
        grade: String,
        #[arg(long, help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },
}

fn client(cli: &Cli) -> ApiClient {
    let client = ApiClient::new(cli.server.clone());
    match std::env::var("STUDENT_API_TOKEN") {
        Ok(token) if !token.is_empty() => client.with_token(token),
        _ => client,
    }
}

/// `@path` reads the body from a file, anything else parses inline.
fn parse_body(raw: &str) -> anyhow::Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading body from {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("body is not valid JSON")
}

fn print_student(student: &Student, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(student)?);
    } else {
        println!(
            "{}  {} {}  <{}>  {}  grade {}  {}",
            student.id,
            student.first_name,
            student.last_name,
            student.email,
            student.student_id,
            student.grade,
            student.status.as_str()
        );
    }
    Ok(())
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut api = client(&cli);

    match &cli.command {
        Commands::Login { email, password } => {
            let auth = api.login(email, password).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&auth)?);
            } else {
                println!("Logged in as {} ({})", auth.user.email, auth.user.role);
                println!("export STUDENT_API_TOKEN={}", auth.token);
            }
        }
        Commands::Whoami => {
            let user = api.me().await.map_err(auth_hint)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("{} {} <{}> role={}", user.first_name, user.last_name, user.email, user.role);
            }
        }
        Commands::Logout => {
            api.logout().await.map_err(auth_hint)?;
            println!("Logged out");
        }
        Commands::Students { cmd } => {
            run_students(cmd, &cli, &mut api).await?;
        }
    }

    Ok(())
}

async fn run_students(
    cmd: &StudentCommands,
    cli: &Cli,
    api: &mut ApiClient,
) -> anyhow::Result<()> {
    match cmd {
        StudentCommands::List {
            page,
            limit,
            search,
            status,
            grade,
        } => {
            let response = api
                .list_students(*page, *limit, search, status, grade)
                .await
                .map_err(auth_hint)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for student in &response.students {
                    print_student(student, false)?;
                }
                println!(
                    "page {} of {} ({} total)",
                    response.page,
                    (response.total + response.limit - 1) / response.limit.max(1),
                    response.total
                );
            }
        }
        StudentCommands::Get { id } => {
            let student = api.get_student(id).await.map_err(auth_hint)?;
            print_student(&student, cli.json)?;
        }
        StudentCommands::Create { body } => {
            let student = api.create_student(parse_body(body)?).await.map_err(auth_hint)?;
            print_student(&student, cli.json)?;
        }
        StudentCommands::Update { id, body } => {
            let student = api
                .update_student(id, parse_body(body)?)
                .await
                .map_err(auth_hint)?;
            print_student(&student, cli.json)?;
        }
        StudentCommands::Delete { id } => {
            api.delete_student(id).await.map_err(auth_hint)?;
            println!("Deleted {}", id);
        }
        StudentCommands::Import { file } => {
            let data = std::fs::read(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("import.csv");
            let result = api.import_students(name, data).await.map_err(auth_hint)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("imported {}, failed {}", result.imported, result.failed);
                for err in &result.errors {
                    println!("  row {}: {}", err.row, err.error);
                }
            }
        }
        StudentCommands::Export {
            search,
            status,
            grade,
            output,
        } => {
            let csv = api
                .export_students(search, status, grade)
                .await
                .map_err(auth_hint)?;
            match output {
                Some(path) => {
                    std::fs::write(path, &csv)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("wrote {}", path.display());
                }
                None => print!("{}", csv),
            }
        }
    }
    Ok(())
}

fn auth_hint(e: ClientError) -> anyhow::Error {
    match e {
        ClientError::Unauthorized => {
            anyhow::anyhow!("not authenticated, run `sms login <email> <password>` and export STUDENT_API_TOKEN")
        }
        other => other.into(),
    }
}
