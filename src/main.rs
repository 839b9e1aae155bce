mod api;
mod cli;
mod commands;
mod config;
mod filters;
mod model;
mod pagination;
mod policy;
mod render;
mod session;
mod validate;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use commands::{ArticleFields, Publish};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blog", about = "Terminal client for the blog API")]
pub struct Args {
    #[arg(long, env = "BLOG_API_URL", help = "API base URL (overrides config)")]
    pub base_url: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "BLOG_SESSION_FILE", help = "Session file path")]
    pub session_file: Option<PathBuf>,

    #[arg(long, help = "Print raw JSON instead of formatted text")]
    pub json: bool,

    #[arg(short, long, help = "Verbose logging (HTTP requests, session changes)")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Log in and save the session
    Login {
        username: String,
        #[arg(long, env = "BLOG_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account and log in
    Register {
        username: String,
        email: String,
        #[arg(long, help = "reader, author, editor or admin (default: reader)")]
        role: Option<String>,
        #[arg(long, env = "BLOG_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show or update your profile
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, help = "Prompt for a new password")]
        new_password: bool,
    },
    /// List articles
    List(ListArgs),
    /// List categories
    Categories,
    /// Show one article
    Show { id: i64 },
    /// Create an article
    New(ArticleArgs),
    /// Edit an article; omitted fields are kept
    Edit {
        id: i64,
        #[command(flatten)]
        fields: ArticleArgs,
    },
    /// Delete an article
    Delete {
        id: i64,
        #[arg(long, short, help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

#[derive(clap::Args)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1, help = "Page number, starting at 1")]
    pub page: u32,
    #[arg(long)]
    pub size: Option<u32>,
    #[arg(long, help = "date, popularity or title")]
    pub sort: Option<String>,
    #[arg(long, help = "asc or desc")]
    pub order: Option<String>,
    #[arg(long)]
    pub keyword: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub tags: Option<String>,
    #[arg(long, help = "Author user id")]
    pub author: Option<i64>,
    #[arg(long, help = "Published on or after (YYYY-MM-DD)")]
    pub from: Option<String>,
    #[arg(long, help = "Published on or before (YYYY-MM-DD)")]
    pub to: Option<String>,
    #[arg(long, help = "Include drafts and scheduled articles")]
    pub all: bool,
    #[arg(long, help = "Only featured articles")]
    pub featured: bool,
    #[arg(long, help = "Only pinned articles")]
    pub pinned: bool,
}

#[derive(clap::Args)]
pub struct ArticleArgs {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,
    #[arg(long, help = "Read content from a file")]
    pub content_file: Option<PathBuf>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, help = "Comma-separated tags")]
    pub tags: Option<String>,
    #[arg(
        long,
        conflicts_with = "draft",
        help = "now, YYYY-MM-DD or YYYY-MM-DDTHH:MM"
    )]
    pub publish_at: Option<String>,
    #[arg(long, help = "Save as draft (no publish time)")]
    pub draft: bool,
    #[arg(long)]
    pub featured: Option<bool>,
    #[arg(long)]
    pub pinned: Option<bool>,
}

impl ArticleArgs {
    fn into_fields(self) -> Result<ArticleFields> {
        let content = match self.content_file {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                anyhow!("reading {}: {}", path.display(), e)
            })?),
            None => self.content,
        };
        let publish = if self.draft {
            Some(Publish::Draft)
        } else {
            self.publish_at
                .map(|at| Publish::parse(&at, Utc::now()))
                .transpose()?
        };
        Ok(ArticleFields {
            title: self.title,
            content,
            category: self.category,
            tags: self.tags,
            publish,
            featured: self.featured,
            pinned: self.pinned,
        })
    }
}

fn init_logging(verbose: bool) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "blog=debug".to_string()
        } else {
            "blog=warn".to_string()
        }
    });
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => cli::read_password("Password: "),
    }
}

fn apply_list_args(ctx: &cli::Context, args: ListArgs) -> Result<()> {
    let mut filters = ctx.filters.borrow_mut();
    if let Some(size) = args.size {
        filters.set("size", &size.to_string())?;
    }
    let text = [
        ("sort", args.sort),
        ("order", args.order),
        ("keyword", args.keyword),
        ("category", args.category),
        ("tags", args.tags),
        ("author", args.author.map(|a| a.to_string())),
        ("from", args.from),
        ("to", args.to),
    ];
    for (key, value) in text {
        if let Some(value) = value {
            filters.set(key, &value)?;
        }
    }
    if args.all {
        filters.published_only = false;
    }
    if args.featured {
        filters.featured = Some(true);
    }
    if args.pinned {
        filters.pinned = Some(true);
    }
    filters.page = args.page.max(1) - 1;
    Ok(())
}

fn run_command(ctx: &cli::Context, command: Command) -> Result<String> {
    match command {
        Command::Login { username, password } => {
            let password = password_or_prompt(password)?;
            commands::login(ctx, &username, &password)
        }
        Command::Register {
            username,
            email,
            role,
            password,
        } => {
            let role = match role {
                Some(r) => Some(
                    model::Role::from_str(&r).ok_or_else(|| anyhow!("unknown role '{}'", r))?,
                ),
                None => None,
            };
            let password = password_or_prompt(password)?;
            commands::register(ctx, &username, &email, &password, role)
        }
        Command::Logout => commands::logout(ctx),
        Command::Whoami => commands::whoami(ctx),
        Command::Profile {
            username,
            email,
            new_password,
        } => {
            let mut request = model::UpdateProfileRequest {
                username,
                email,
                ..Default::default()
            };
            if new_password {
                request.current_password = Some(cli::read_password("Current password: ")?);
                request.new_password = Some(cli::read_password("New password: ")?);
            }
            if request.is_empty() {
                commands::profile(ctx)
            } else {
                commands::update_profile(ctx, &request)
            }
        }
        Command::List(args) => {
            apply_list_args(ctx, args)?;
            commands::list(ctx)
        }
        Command::Categories => commands::categories(ctx),
        Command::Show { id } => commands::show(ctx, id),
        Command::New(args) => commands::create(ctx, args.into_fields()?),
        Command::Edit { id, fields } => commands::edit(ctx, id, fields.into_fields()?),
        Command::Delete { id, yes } => {
            if !yes {
                if !cli::confirm(&format!("Delete article #{}?", id))? {
                    return Ok("Cancelled".to_string());
                }
            }
            commands::delete(ctx, id)
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    let mut cfg = match &args.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    if let Some(url) = &args.base_url {
        cfg.api.base_url = Some(url.clone());
    }
    if let Some(path) = &args.session_file {
        cfg.session.path = Some(path.clone());
    }
    if let Err(errors) = cfg.validate() {
        for e in &errors {
            eprintln!("Config error {}", e);
        }
        return Err(anyhow!("invalid configuration"));
    }

    let session_path = cfg.session_path();
    tracing::debug!(base_url = cfg.base_url(), session = %session_path.display(), "starting");

    let api = api::Client::new(cfg.base_url(), cfg.timeout());
    let session = session::SessionStore::open(&session_path)?;
    let ctx = cli::Context::new(Box::new(api), session, cfg.page_size(), args.json);

    match args.command {
        Some(command) => {
            let out = run_command(&ctx, command)?;
            println!("{}", out);
            Ok(())
        }
        None => cli::run_repl(ctx),
    }
}
