use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use deala_client::ApiClient;
use deala_client::Config;
use deala_parser::Deal;
use deala_parser::parse_deals;
use serde_json::Value;

/// Deala deal-search client.
#[derive(Debug, Parser)]
#[clap(author, version)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the returned token pair under DEALA_HOME.
    Login {
        email: String,
        password: String,
    },

    /// Create a new account. A verification email is sent before the first
    /// login is accepted.
    Register {
        email: String,
        password: String,
    },

    /// Confirm an email address using the token from the verification link.
    Verify {
        token: String,
    },

    /// Remove stored credentials.
    Logout,

    /// Show credential presence and subscription state.
    Status,

    /// Ask the deal assistant and print the offers it found.
    Search {
        /// Free-text query, e.g. `deala search wireless headphones under $200`.
        query: Vec<String>,

        /// Conversation id from a previous reply, to ask a follow-up.
        #[clap(long)]
        conversation: Option<String>,

        /// Print the assistant's raw reply instead of parsed offers.
        #[clap(long)]
        raw: bool,
    },

    /// Start a checkout for the given plan variant and print the URL.
    Subscribe {
        variant_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;
    let mut client = ApiClient::new(&config).context("failed to build API client")?;
    client.set_session_expired_hook(|| {
        eprintln!("Session expired. Run `deala login` to sign in again.");
    });

    match cli.command {
        Command::Login { email, password } => {
            client.login(&email, &password).await?;
            println!("Signed in as {email}.");
        }
        Command::Register { email, password } => {
            client.register(&email, &password).await?;
            println!(
                "Account created. Check {email} for a verification link, then run \
                 `deala verify <token>`."
            );
        }
        Command::Verify { token } => {
            let message = client.verify_email(&token).await?;
            println!("{message}");
        }
        Command::Logout => {
            if client.logout()? {
                println!("Signed out.");
            } else {
                println!("No stored credentials.");
            }
        }
        Command::Status => {
            if !client.token_store().has_valid_tokens() {
                println!("Not signed in.");
                return Ok(());
            }
            let subscribed = client.check_subscription().await?;
            println!(
                "Signed in. Subscription: {}.",
                if subscribed { "active" } else { "inactive" }
            );
        }
        Command::Search {
            query,
            conversation,
            raw,
        } => {
            let query = query.join(" ");
            if query.trim().is_empty() {
                bail!("enter what you're looking for, e.g. `deala search running shoes`");
            }
            run_search(&client, &query, conversation.as_deref(), raw).await?;
        }
        Command::Subscribe { variant_id } => {
            let checkout_url = client.create_checkout(&variant_id).await?;
            println!("Open this link to finish checkout:\n{checkout_url}");
        }
    }

    Ok(())
}

async fn run_search(
    client: &ApiClient,
    query: &str,
    conversation: Option<&str>,
    raw: bool,
) -> anyhow::Result<()> {
    // Deal search is gated on an active subscription, same as the web app.
    if !client.check_subscription().await? {
        bail!("an active subscription is required; run `deala subscribe <variant-id>`");
    }

    let conversation_id = conversation.map(|id| Value::String(id.to_string()));
    let reply = client.user_query(query, conversation_id.as_ref()).await?;

    if raw {
        println!("{}", reply.response);
        return Ok(());
    }

    let deals = parse_deals(&reply.response);
    if deals.is_empty() {
        println!("No deals found. Try rephrasing your search.");
    } else {
        for deal in &deals {
            print_deal(deal);
        }
    }

    if let Some(conversation_id) = &reply.conversation_id {
        let id = match conversation_id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        println!("\nFollow up with: deala search --conversation {id} <query>");
    }
    Ok(())
}

fn print_deal(deal: &Deal) {
    println!("\n{}", deal.name);
    if let Some(current) = &deal.current_price {
        match &deal.original_price {
            Some(original) => println!("  ${current} (was ${original})"),
            None => println!("  ${current}"),
        }
    }
    if let Some(savings) = deal.savings() {
        // Display precision is decided here, not at computation time.
        println!(
            "  Save ${:.2} ({:.1}% off)",
            savings.amount, savings.percentage
        );
    }
    if let Some(description) = &deal.description {
        println!("  {description}");
    }
    for coupon in &deal.coupons {
        println!("  Coupon {}: {}", coupon.code, coupon.description);
    }
    for cashback in &deal.cashback {
        println!("  Cashback via {}: {}", cashback.platform, cashback.amount);
    }
    if !deal.steps.is_empty() {
        println!("  How to get it:");
        for (index, step) in deal.steps.iter().enumerate() {
            println!("    {}. {step}", index + 1);
        }
    }
    if let Some(expiration) = &deal.expiration {
        println!("  Expires: {expiration}");
    }
    if let Some(link) = &deal.product_link {
        println!("  {link}");
    }
}
