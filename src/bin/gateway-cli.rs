use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

use api_gateway::config::loader::parse_routes;
use api_gateway::routing::RouteTable;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Helper CLI for the API gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a signed bearer token
    Token {
        /// Shared HMAC secret
        #[arg(short, long, env = "GATEWAY_JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Lifetime in seconds; omit for a token without `exp`
        #[arg(long)]
        ttl_secs: Option<i64>,

        #[arg(long, value_enum, default_value_t = Alg::Hs256)]
        alg: Alg,

        /// Subject claim
        #[arg(long)]
        sub: Option<String>,
    },
    /// Print the compiled route table
    Routes {
        #[arg(short, long, default_value = "endpoints.json")]
        routes: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Alg {
    Hs256,
    Hs384,
    Hs512,
}

impl From<Alg> for Algorithm {
    fn from(alg: Alg) -> Self {
        match alg {
            Alg::Hs256 => Algorithm::HS256,
            Alg::Hs384 => Algorithm::HS384,
            Alg::Hs512 => Algorithm::HS512,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token {
            secret,
            ttl_secs,
            alg,
            sub,
        } => {
            let now = Utc::now().timestamp();
            let mut claims = Map::new();
            claims.insert("iat".into(), json!(now));
            if let Some(ttl) = ttl_secs {
                claims.insert("exp".into(), json!(now + ttl));
            }
            if let Some(sub) = sub {
                claims.insert("sub".into(), json!(sub));
            }

            let token = encode(
                &Header::new(alg.into()),
                &Value::Object(claims),
                &EncodingKey::from_secret(secret.as_bytes()),
            )?;
            println!("{token}");
        }
        Commands::Routes { routes } => {
            let document = parse_routes(&std::fs::read_to_string(&routes)?)?;
            let table = RouteTable::from_config(&document)?;
            for route in table.iter() {
                println!(
                    "{:<7} {:<30} -> {}{}",
                    route.method.as_str(),
                    route.path,
                    route.upstream,
                    if route.auth_required { "  [token]" } else { "" }
                );
            }
            eprintln!("{} routes", table.len());
        }
    }

    Ok(())
}
