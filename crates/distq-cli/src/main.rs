//! distq CLI: run a worker, or drive a cluster as the coordinator.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use distq_core::prelude::{EngineConfig, Schema, Tuple};
use distq_exec::{execute_local, ClusterConfig, Coordinator, ExecError, Worker};
use distq_io::Catalog;
use distq_operators::SourceProvider;
use tracing::info;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "distq")]
#[command(about = "Miniature distributed query engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tables in a data directory as one worker
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: u16,

        /// Directory holding catalog.yaml and the table files
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Interface to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Interactive coordinator: one plan per line
    Client {
        /// Cluster file listing workers and table schemas
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run one or more plans across the cluster and exit
    Query {
        #[arg(short, long)]
        config: PathBuf,

        /// Plans to run, in order
        #[arg(required = true)]
        plans: Vec<String>,
    },

    /// Run a plan against a local data directory, without workers
    Local {
        #[arg(short, long)]
        data_dir: PathBuf,

        plan: String,
    },

    /// Print every row of one table in a data directory
    Print {
        #[arg(short, long)]
        data_dir: PathBuf,

        #[arg(short, long)]
        table: String,
    },
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Serve {
            port,
            data_dir,
            host,
        } => serve(&host, port, &data_dir),
        Commands::Client { config } => client(&config),
        Commands::Query { config, plans } => query(&config, &plans),
        Commands::Local { data_dir, plan } => local(&data_dir, &plan),
        Commands::Print { data_dir, table } => print_table(&data_dir, &table),
    };
    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn serve(host: &str, port: u16, data_dir: &Path) -> CliResult<()> {
    let catalog = Catalog::open(data_dir)?;
    let config = EngineConfig::from_env();
    runtime()?.block_on(async move {
        let worker = Worker::bind((host, port), catalog, config).await?;
        worker
            .serve_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
    })?;
    Ok(())
}

fn coordinator(config: &Path) -> CliResult<Coordinator> {
    let cluster = ClusterConfig::from_path(config)?;
    let coordinator = Coordinator::from_cluster(&cluster, EngineConfig::from_env())?;
    info!(workers = coordinator.workers().len(), "cluster loaded");
    Ok(coordinator)
}

fn client(config: &Path) -> CliResult<()> {
    let coordinator = coordinator(config)?;
    let rt = runtime()?;
    let stdin = io::stdin();
    let mut out = io::stdout();

    loop {
        write!(out, "distq> ")?;
        out.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "help" => {
                print_help(&mut out)?;
                continue;
            }
            _ => {}
        }
        match rt.block_on(coordinator.query(line)) {
            Ok(result) => {
                print_rows(&mut out, &result.schema, &result.rows)?;
                writeln!(
                    out,
                    "({} rows, {} ms)",
                    result.rows.len(),
                    result.stats.elapsed.as_millis()
                )?;
            }
            // A bad line is the user's mistake; keep the session alive.
            Err(ExecError::Plan(e)) => writeln!(out, "error: {e}")?,
            Err(e) => writeln!(out, "query failed: {e}")?,
        }
    }
    Ok(())
}

fn query(config: &Path, plans: &[String]) -> CliResult<()> {
    let coordinator = coordinator(config)?;
    let rt = runtime()?;
    let mut out = io::stdout().lock();
    for plan in plans {
        let result = rt.block_on(coordinator.query(plan))?;
        print_rows(&mut out, &result.schema, &result.rows)?;
    }
    Ok(())
}

fn local(data_dir: &Path, plan: &str) -> CliResult<()> {
    let catalog = Catalog::open(data_dir)?;
    let (schema, rows) = execute_local(&catalog, plan)?;
    print_rows(&mut io::stdout().lock(), &schema, &rows)?;
    Ok(())
}

fn print_table(data_dir: &Path, table: &str) -> CliResult<()> {
    let catalog = Catalog::open(data_dir)?;
    let source = catalog
        .source(table)
        .ok_or_else(|| format!("unknown table '{table}'"))?;
    let rows = source.scan()?.collect::<Result<Vec<_>, _>>()?;
    print_rows(&mut io::stdout().lock(), source.schema(), &rows)?;
    Ok(())
}

fn print_rows(out: &mut impl Write, schema: &Schema, rows: &[Tuple]) -> io::Result<()> {
    let header: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    writeln!(out, "{}", header.join("\t"))?;
    for row in rows {
        writeln!(out, "{row}")?;
    }
    Ok(())
}

fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Enter one plan per line, e.g.")?;
    writeln!(out, "  AGG(SCAN(t), SUM(v), GROUP k)")?;
    writeln!(out, "  JOIN(SCAN(a), SCAN(b), 0 = 0)")?;
    writeln!(out, "Operators: SCAN FILTER PROJECT JOIN AGG VALUES")?;
    writeln!(out, "Commands: help, exit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use distq_core::prelude::{DataType, Field, Scalar};

    #[test]
    fn rows_print_with_a_header() {
        let schema = Schema::new(vec![
            Field::new("k", DataType::Int64),
            Field::new("name", DataType::Utf8),
        ]);
        let rows = vec![Tuple::new(vec![Scalar::Int(1), Scalar::Text("a".into())])];
        let mut buf = Vec::new();
        print_rows(&mut buf, &schema, &rows).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "k\tname\n1\ta\n");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["distq", "serve", "--port", "7000", "--data-dir", "d"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: 7000, .. }));
        let cli = Cli::try_parse_from(["distq", "query", "--config", "c.yaml", "SCAN(t)"]).unwrap();
        assert!(matches!(cli.command, Commands::Query { ref plans, .. } if plans.len() == 1));
        assert!(Cli::try_parse_from(["distq", "query", "--config", "c.yaml"]).is_err());
    }
}
