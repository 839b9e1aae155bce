use crate::api::BlogApi;
use crate::commands::{self, ArticleFields, Publish};
use crate::filters::{ArticleFilters, FILTER_KEYS};
use crate::model::{Role, UpdateProfileRequest, User};
use crate::policy::{self, Action};
use crate::session::SessionStore;
use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{ColorMode, Config, DefaultEditor, Editor, Helper};
use std::borrow::Cow;
use std::cell::RefCell;

pub struct Context {
    pub api: Box<dyn BlogApi>,
    pub session: RefCell<SessionStore>,
    pub filters: RefCell<ArticleFilters>,
    /// Page count from the last listing, for paging commands
    pub total_pages: RefCell<u32>,
    pub json: bool,
}

impl Context {
    pub fn new(api: Box<dyn BlogApi>, session: SessionStore, page_size: u32, json: bool) -> Self {
        Self {
            api,
            session: RefCell::new(session),
            filters: RefCell::new(ArticleFilters::new(page_size)),
            total_pages: RefCell::new(0),
            json,
        }
    }

    pub fn user(&self) -> Option<User> {
        self.session.borrow().user().cloned()
    }

    pub fn token(&self) -> Option<String> {
        self.session.borrow().token().map(String::from)
    }

    pub fn require_token(&self) -> Result<String> {
        self.token()
            .ok_or_else(|| anyhow!("not logged in; use /login or `blog login` first"))
    }
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("blog - type /help for commands, /exit to quit");
    let user = ctx.user();
    println!("{}", crate::render::whoami(user.as_ref()));
    if policy::can_create(user.as_ref()) {
        println!("Type /new to write an article.");
    }
    print_result(commands::list(&ctx));

    loop {
        let prompt = match ctx.user() {
            Some(user) => format!("{}> ", user.username),
            None => "> ".to_string(),
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if keep_in_history(line) {
                    rl.add_history_entry(line)?;
                }

                if line.starts_with('/') {
                    if handle_command(&ctx, &mut rl, line) {
                        break;
                    }
                    continue;
                }

                // Bare text searches by keyword
                print_result(commands::set_filter(&ctx, "keyword", line));
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// `/login user password` carries a secret and is never recorded
fn keep_in_history(line: &str) -> bool {
    match shell_words::split(line) {
        Ok(parts) => !(parts.first().map(String::as_str) == Some("/login") && parts.len() > 2),
        Err(_) => !line.starts_with("/login"),
    }
}

fn print_result(result: Result<String>) {
    match result {
        Ok(out) => println!("{}", out),
        Err(e) => eprintln!("Error: {:#}", e),
    }
}

fn parse_id(arg: Option<&String>) -> Result<i64> {
    let arg = arg.ok_or_else(|| anyhow!("an article id is required"))?;
    arg.trim_start_matches('#')
        .parse()
        .map_err(|_| anyhow!("invalid article id '{}'", arg))
}

/// Returns true when the REPL should exit
fn handle_command(ctx: &Context, rl: &mut DefaultEditor, line: &str) -> bool {
    let parts = match shell_words::split(line) {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("Error: {}", e);
            return false;
        }
    };
    let Some(cmd) = parts.first() else {
        return false;
    };
    let args = &parts[1..];

    let result = match cmd.as_str() {
        "/exit" | "/quit" => return true,
        "/help" => Ok(help_text()),
        "/login" => repl_login(ctx, args),
        "/register" => repl_register(ctx, args),
        "/logout" => commands::logout(ctx),
        "/whoami" => commands::whoami(ctx),
        "/profile" => repl_profile(ctx, args),
        "/list" | "/ls" => commands::list(ctx),
        "/next" | "/n" => commands::next_page(ctx),
        "/prev" | "/p" => commands::prev_page(ctx),
        "/page" => match args.first().map(|n| n.parse::<u32>()) {
            Some(Ok(n)) => commands::goto_page(ctx, n),
            _ => Err(anyhow!("usage: /page <number>")),
        },
        "/filter" => match args {
            [key] => commands::set_filter(ctx, key, ""),
            [key, rest @ ..] => commands::set_filter(ctx, key, &rest.join(" ")),
            [] => Err(anyhow!(
                "usage: /filter <key> [value]. Keys: {}",
                FILTER_KEYS.join(", ")
            )),
        },
        "/filters" => Ok(describe_filters(ctx)),
        "/clear" => commands::clear_filters(ctx),
        "/categories" => commands::categories(ctx),
        "/show" => parse_id(args.first()).and_then(|id| commands::show(ctx, id)),
        "/new" => repl_new(ctx, rl),
        "/edit" => repl_edit(ctx, rl, args),
        "/delete" | "/rm" => repl_delete(ctx, args),
        _ => Err(anyhow!("Unknown command: {}. Try /help", cmd)),
    };

    print_result(result);
    false
}

fn help_text() -> String {
    [
        "Session:",
        "  /login <user> [password]            - log in (password prompted if omitted)",
        "  /register <user> <email> [role]     - create an account (default role: reader)",
        "  /logout                             - forget the saved session",
        "  /whoami                             - show the current user",
        "  /profile [username|email|password]  - show or change your profile",
        "Browsing:",
        "  /list                               - list articles with current filters",
        "  /next, /prev, /page <n>             - move between pages",
        "  /filter <key> [value]               - set or clear a filter",
        "  /filters                            - show active filters",
        "  /clear                              - reset all filters",
        "  /categories                         - list categories",
        "  /show <id>                          - show one article",
        "  <text>                              - search by keyword",
        "Writing:",
        "  /new                                - write a new article",
        "  /edit <id>                          - edit an article",
        "  /delete <id>                        - delete an article",
        "  /exit                               - quit",
    ]
    .join("\n")
}

fn describe_filters(ctx: &Context) -> String {
    let filters = ctx.filters.borrow();
    let active = filters.describe();
    let mut out = format!(
        "Page size: {}\nAvailable keys: {}",
        filters.size,
        FILTER_KEYS.join(", ")
    );
    if active.is_empty() {
        out.push_str("\nNo filters set");
    } else {
        for (key, value) in active {
            out.push_str(&format!("\n  {} = {}", key, value));
        }
    }
    out
}

/// Renders every typed character as `*`
struct MaskingHighlighter {
    masking: bool,
}

impl Highlighter for MaskingHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if self.masking {
            Cow::Owned("*".repeat(line.chars().count()))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        self.masking
    }
}

impl Completer for MaskingHighlighter {
    type Candidate = String;
}

impl Hinter for MaskingHighlighter {
    type Hint = String;
}

impl Validator for MaskingHighlighter {}

impl Helper for MaskingHighlighter {}

/// Read a password with masked echo on its own editor, outside the REPL history
pub fn read_password(prompt: &str) -> Result<String> {
    let config = Config::builder()
        .auto_add_history(false)
        .color_mode(ColorMode::Forced)
        .build();
    let mut editor: Editor<MaskingHighlighter, DefaultHistory> = Editor::with_config(config)?;
    editor.set_helper(Some(MaskingHighlighter { masking: true }));
    Ok(editor.readline(prompt)?)
}

/// Yes/no question; anything but y or yes is a no
pub fn confirm(prompt: &str) -> Result<bool> {
    let mut editor = DefaultEditor::new()?;
    let answer = editor.readline(&format!("{} [y/N] ", prompt))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn repl_login(ctx: &Context, args: &[String]) -> Result<String> {
    let username = args
        .first()
        .ok_or_else(|| anyhow!("usage: /login <username> [password]"))?;
    let password = match args.get(1) {
        Some(p) => p.clone(),
        None => read_password("Password: ")?,
    };
    commands::login(ctx, username, &password)
}

fn repl_register(ctx: &Context, args: &[String]) -> Result<String> {
    let [username, email, rest @ ..] = args else {
        bail!("usage: /register <username> <email> [reader|author|editor|admin]");
    };
    let role = match rest.first() {
        Some(r) => Some(Role::from_str(r).ok_or_else(|| anyhow!("unknown role '{}'", r))?),
        None => None,
    };
    let password = read_password("Password: ")?;
    commands::register(ctx, username, email, &password, role)
}

fn repl_profile(ctx: &Context, args: &[String]) -> Result<String> {
    let mut request = UpdateProfileRequest::default();
    match args {
        [] => return commands::profile(ctx),
        [field, value] if field == "username" => request.username = Some(value.clone()),
        [field, value] if field == "email" => request.email = Some(value.clone()),
        [field] if field == "password" => {
            request.current_password = Some(read_password("Current password: ")?);
            request.new_password = Some(read_password("New password: ")?);
        }
        _ => bail!("usage: /profile [username <name> | email <address> | password]"),
    }
    commands::update_profile(ctx, &request)
}

fn repl_new(ctx: &Context, rl: &mut DefaultEditor) -> Result<String> {
    // Refuse before the form is filled in
    policy::check(ctx.user().as_ref(), Action::Create, None)?;
    let fields = prompt_fields(rl, None)?;
    commands::create(ctx, fields)
}

fn repl_edit(ctx: &Context, rl: &mut DefaultEditor, args: &[String]) -> Result<String> {
    let id = parse_id(args.first())?;
    let token = ctx.token();
    let article = ctx
        .api
        .get_article(id, token.as_deref())
        .map_err(|e| anyhow!("article #{}: {}", id, e))?;
    policy::check(ctx.user().as_ref(), Action::Edit, article.author_id)?;
    let fields = prompt_fields(rl, Some(&article))?;
    commands::edit(ctx, id, fields)
}

fn repl_delete(ctx: &Context, args: &[String]) -> Result<String> {
    let id = parse_id(args.first())?;
    if !confirm(&format!("Delete article #{}?", id))? {
        return Ok("Cancelled".to_string());
    }
    commands::delete(ctx, id)
}

fn ask(rl: &mut DefaultEditor, label: &str, initial: &str) -> Result<String> {
    let line = rl.readline_with_initial(&format!("{}: ", label), (initial, ""))?;
    Ok(line.trim().to_string())
}

fn ask_flag(rl: &mut DefaultEditor, label: &str, current: bool) -> Result<bool> {
    let hint = if current { "Y/n" } else { "y/N" };
    let line = rl.readline(&format!("{} [{}]: ", label, hint))?;
    Ok(match line.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => current,
    })
}

/// Interactive article form. With an existing article, its values are
/// offered for editing.
fn prompt_fields(
    rl: &mut DefaultEditor,
    existing: Option<&crate::model::Article>,
) -> Result<ArticleFields> {
    let title = ask(rl, "Title", existing.map(|a| a.title.as_str()).unwrap_or(""))?;
    let category = ask(
        rl,
        "Category",
        existing.and_then(|a| a.category.as_deref()).unwrap_or(""),
    )?;
    let tags = ask(
        rl,
        "Tags (comma separated)",
        existing.and_then(|a| a.tags.as_deref()).unwrap_or(""),
    )?;
    let publish_default = match existing {
        Some(a) => a.published_at.clone().unwrap_or_default(),
        None => "now".to_string(),
    };
    let publish = ask(
        rl,
        "Publish at (now, YYYY-MM-DD[THH:MM], blank for draft)",
        &publish_default,
    )?;
    let publish = Publish::parse(&publish, Utc::now())?;
    let featured = ask_flag(rl, "Featured", existing.is_some_and(|a| a.featured))?;
    let pinned = ask_flag(rl, "Pinned", existing.is_some_and(|a| a.pinned))?;

    println!("Content (end with a line containing only '.'; blank keeps current):");
    let mut lines = Vec::new();
    loop {
        let line = rl.readline("")?;
        if line.trim() == "." {
            break;
        }
        lines.push(line);
    }
    let content = lines.join("\n");
    let content = if content.trim().is_empty() {
        existing.and_then(|a| a.content.clone())
    } else {
        Some(content)
    };

    Ok(ArticleFields {
        title: Some(title),
        content,
        category: Some(category),
        tags: Some(tags),
        publish: Some(publish),
        featured: Some(featured),
        pinned: Some(pinned),
    })
}
