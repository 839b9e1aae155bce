//! Blog operations shared by the one-shot subcommands and the REPL.
//!
//! Each operation returns the text to print. Permission checks run before
//! any mutating request so a refused action never reaches the server.

use crate::api::ApiError;
use crate::cli::Context;
use crate::model::{
    format_wire_timestamp, parse_timestamp, ArticleRequest, RegisterRequest, Role,
    UpdateProfileRequest,
};
use crate::policy::{self, Action, ArticlePermissions};
use crate::session::Session;
use crate::{render, validate};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::info;

/// Publication choice for a new or edited article
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publish {
    Draft,
    At(String),
}

impl Publish {
    /// Parse user input: blank or "draft" is a draft, "now" is the current
    /// time, otherwise a date (midnight UTC) or date-time.
    pub fn parse(input: &str, now: DateTime<Utc>) -> Result<Self> {
        let input = input.trim();
        match input.to_lowercase().as_str() {
            "" | "draft" => return Ok(Self::Draft),
            "now" => return Ok(Self::At(format_wire_timestamp(&now))),
            _ => {}
        }
        if let Some(at) = parse_timestamp(input) {
            return Ok(Self::At(format_wire_timestamp(&at)));
        }
        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            let at = date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or_else(|| anyhow!("invalid date '{}'", input))?;
            return Ok(Self::At(format_wire_timestamp(&at)));
        }
        bail!(
            "publish time must be 'now', 'draft', YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS], got '{}'",
            input
        )
    }
}

/// Article fields supplied by the user; `None` leaves a field as it was
#[derive(Debug, Clone, Default)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub publish: Option<Publish>,
    pub featured: Option<bool>,
    pub pinned: Option<bool>,
}

impl ArticleFields {
    /// Overlay these fields on `base` and normalize the result
    pub fn apply(self, mut base: ArticleRequest) -> ArticleRequest {
        if let Some(title) = self.title {
            base.title = title;
        }
        if self.content.is_some() {
            base.content = self.content;
        }
        if self.category.is_some() {
            base.category = self.category;
        }
        if self.tags.is_some() {
            base.tags = self.tags;
        }
        match self.publish {
            Some(Publish::Draft) => base.published_at = None,
            Some(Publish::At(at)) => base.published_at = Some(at),
            None => {}
        }
        if self.featured.is_some() {
            base.featured = self.featured;
        }
        if self.pinned.is_some() {
            base.pinned = self.pinned;
        }
        base.normalized()
    }

    /// Request for a new article; publishes immediately unless told otherwise
    pub fn into_new_request(self, now: DateTime<Utc>) -> ArticleRequest {
        let base = ArticleRequest {
            published_at: Some(format_wire_timestamp(&now)),
            featured: Some(false),
            pinned: Some(false),
            ..Default::default()
        };
        self.apply(base)
    }
}

fn article_error(id: i64) -> impl FnOnce(ApiError) -> anyhow::Error {
    move |e| match e {
        ApiError::NotFound => anyhow!("article #{} not found", id),
        other => other.into(),
    }
}

fn check_valid(errors: Vec<crate::config::ValidationError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        bail!("{}", validate::summarize(&errors))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn login(ctx: &Context, username: &str, password: &str) -> Result<String> {
    let resp = ctx.api.login(username.trim(), password).map_err(|e| match e {
        ApiError::Unauthenticated | ApiError::Forbidden(_) => {
            anyhow!("login failed: invalid username or password")
        }
        other => other.into(),
    })?;
    let user = resp.user();
    let message = format!("Logged in as {} [{}]", user.username, user.role);
    info!(user = %user.username, role = %user.role, "logged in");
    ctx.session.borrow_mut().replace(Session {
        token: resp.token,
        user,
    })?;
    Ok(message)
}

pub fn register(
    ctx: &Context,
    username: &str,
    email: &str,
    password: &str,
    role: Option<Role>,
) -> Result<String> {
    check_valid(validate::registration(username, email, password))?;
    let request = RegisterRequest {
        username: username.trim().to_string(),
        email: email.trim().to_string(),
        password: password.to_string(),
        role: role.unwrap_or(Role::Reader),
    };
    let resp = ctx.api.register(&request)?;
    let user = resp.user();
    let message = format!("Registered and logged in as {} [{}]", user.username, user.role);
    info!(user = %user.username, role = %user.role, "registered");
    ctx.session.borrow_mut().replace(Session {
        token: resp.token,
        user,
    })?;
    Ok(message)
}

pub fn logout(ctx: &Context) -> Result<String> {
    let mut session = ctx.session.borrow_mut();
    if session.current().is_none() {
        return Ok("Not logged in".to_string());
    }
    session.clear()?;
    info!("logged out");
    Ok("Logged out".to_string())
}

pub fn whoami(ctx: &Context) -> Result<String> {
    let session = ctx.session.borrow();
    if ctx.json {
        return to_json(&session.user());
    }
    Ok(render::whoami(session.user()))
}

pub fn profile(ctx: &Context) -> Result<String> {
    let token = ctx.require_token()?;
    let profile = ctx.api.profile(&token)?;
    ctx.session.borrow_mut().update_user(profile.user())?;
    if ctx.json {
        return to_json(&profile);
    }
    Ok(render::profile(&profile))
}

pub fn update_profile(ctx: &Context, request: &UpdateProfileRequest) -> Result<String> {
    let token = ctx.require_token()?;
    let request = UpdateProfileRequest {
        username: request.username.as_deref().map(|u| u.trim().to_string()),
        email: request.email.as_deref().map(|e| e.trim().to_string()),
        ..request.clone()
    };
    check_valid(validate::profile_update(&request))?;
    let updated = ctx.api.update_profile(&request, &token)?;
    ctx.session.borrow_mut().update_user(updated.user())?;
    info!(user = %updated.username, "profile updated");
    if ctx.json {
        return to_json(&updated);
    }
    Ok(format!("Profile updated.\n{}", render::profile(&updated)))
}

pub fn list(ctx: &Context) -> Result<String> {
    let token = ctx.token();
    let page = {
        let filters = ctx.filters.borrow();
        ctx.api.list_articles(&filters, token.as_deref())?
    };
    *ctx.total_pages.borrow_mut() = page.total_pages;
    if ctx.json {
        return to_json(&page);
    }
    let user = ctx.user();
    Ok(render::article_list(
        &page,
        &ctx.filters.borrow(),
        user.as_ref(),
        Utc::now(),
    ))
}

pub fn next_page(ctx: &Context) -> Result<String> {
    let total = *ctx.total_pages.borrow();
    if !ctx.filters.borrow_mut().next_page(total) {
        return Ok("Already on the last page".to_string());
    }
    list(ctx)
}

pub fn prev_page(ctx: &Context) -> Result<String> {
    if !ctx.filters.borrow_mut().prev_page() {
        return Ok("Already on the first page".to_string());
    }
    list(ctx)
}

pub fn goto_page(ctx: &Context, number: u32) -> Result<String> {
    let total = *ctx.total_pages.borrow();
    ctx.filters.borrow_mut().goto_page(number, total);
    list(ctx)
}

pub fn set_filter(ctx: &Context, key: &str, value: &str) -> Result<String> {
    ctx.filters.borrow_mut().set(key, value)?;
    list(ctx)
}

pub fn clear_filters(ctx: &Context) -> Result<String> {
    ctx.filters.borrow_mut().reset();
    list(ctx)
}

pub fn categories(ctx: &Context) -> Result<String> {
    let categories = ctx.api.categories();
    if ctx.json {
        return to_json(&categories);
    }
    if categories.is_empty() {
        return Ok("No categories.".to_string());
    }
    Ok(categories.join("\n"))
}

pub fn show(ctx: &Context, id: i64) -> Result<String> {
    let token = ctx.token();
    let article = ctx
        .api
        .get_article(id, token.as_deref())
        .map_err(article_error(id))?;
    if ctx.json {
        return to_json(&article);
    }
    let user = ctx.user();
    let perms = ArticlePermissions::for_owner(user.as_ref(), article.author_id);
    Ok(render::article_detail(&article, perms, Utc::now()))
}

pub fn create(ctx: &Context, fields: ArticleFields) -> Result<String> {
    policy::check(ctx.user().as_ref(), Action::Create, None)?;
    let token = ctx.require_token()?;
    let request = fields.into_new_request(Utc::now());
    check_valid(validate::article(&request))?;

    let article = ctx.api.create_article(&request, &token)?;
    info!(id = article.id, title = %article.title, "article created");
    if ctx.json {
        return to_json(&article);
    }
    Ok(format!(
        "Created article #{} ({})",
        article.id,
        article.status().label()
    ))
}

pub fn edit(ctx: &Context, id: i64, fields: ArticleFields) -> Result<String> {
    let token = ctx.require_token()?;
    let article = ctx
        .api
        .get_article(id, Some(&token))
        .map_err(article_error(id))?;
    policy::check(ctx.user().as_ref(), Action::Edit, article.author_id)?;

    let request = fields.apply(ArticleRequest::from_article(&article));
    check_valid(validate::article(&request))?;

    let updated = ctx
        .api
        .update_article(id, &request, &token)
        .map_err(article_error(id))?;
    info!(id = updated.id, "article updated");
    if ctx.json {
        return to_json(&updated);
    }
    Ok(format!(
        "Updated article #{} ({})",
        updated.id,
        updated.status().label()
    ))
}

pub fn delete(ctx: &Context, id: i64) -> Result<String> {
    let token = ctx.require_token()?;
    let article = ctx
        .api
        .get_article(id, Some(&token))
        .map_err(article_error(id))?;
    policy::check(ctx.user().as_ref(), Action::Delete, article.author_id)?;

    ctx.api
        .delete_article(id, &token)
        .map_err(article_error(id))?;
    info!(id, "article deleted");
    Ok(format!("Deleted article #{} ({})", id, article.title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BlogApi;
    use crate::filters::ArticleFilters;
    use crate::model::{Article, AuthResponse, Page, User, UserProfile};
    use crate::session::SessionStore;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// In-memory API: a fixed set of users and a mutable article table
    #[derive(Default)]
    struct FakeState {
        users: Vec<(User, String)>,
        articles: Vec<Article>,
        calls: Vec<String>,
        last_filters: Option<ArticleFilters>,
        next_id: i64,
    }

    #[derive(Clone, Default)]
    struct FakeApi {
        state: Rc<RefCell<FakeState>>,
    }

    fn token_for(user: &User) -> String {
        format!("token-{}", user.id)
    }

    impl FakeApi {
        fn with_users(users: &[(i64, &str, Role)]) -> Self {
            let api = FakeApi::default();
            {
                let mut state = api.state.borrow_mut();
                state.next_id = 100;
                for (id, name, role) in users {
                    state.users.push((
                        User {
                            id: *id,
                            username: name.to_string(),
                            email: format!("{}@example.com", name),
                            role: *role,
                        },
                        "secret1".to_string(),
                    ));
                }
            }
            api
        }

        fn add_article(&self, id: i64, author_id: Option<i64>) {
            self.state.borrow_mut().articles.push(Article {
                id,
                title: format!("Article {}", id),
                content: Some("Some content".to_string()),
                created_at: "2024-01-01T10:00:00".to_string(),
                updated_at: None,
                published_at: Some("2024-01-02T10:00:00".to_string()),
                view_count: 0,
                author_id,
                category: None,
                tags: None,
                featured: false,
                pinned: false,
            });
        }

        fn calls(&self) -> Vec<String> {
            self.state.borrow().calls.clone()
        }

        fn user_for_token(&self, token: &str) -> Result<User, ApiError> {
            self.state
                .borrow()
                .users
                .iter()
                .map(|(u, _)| u)
                .find(|u| token_for(u) == token)
                .cloned()
                .ok_or(ApiError::Unauthenticated)
        }

        fn auth(user: &User) -> AuthResponse {
            AuthResponse {
                token: token_for(user),
                token_type: "Bearer".to_string(),
                id: user.id,
                username: user.username.clone(),
                email: user.email.clone(),
                role: user.role,
            }
        }

        fn record(&self, call: String) {
            self.state.borrow_mut().calls.push(call);
        }
    }

    impl BlogApi for FakeApi {
        fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
            self.record(format!("login {}", username));
            let state = self.state.borrow();
            state
                .users
                .iter()
                .find(|(u, p)| u.username == username && p == password)
                .map(|(u, _)| Self::auth(u))
                .ok_or(ApiError::Unauthenticated)
        }

        fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
            self.record(format!("register {} {}", request.username, request.role));
            let mut state = self.state.borrow_mut();
            if state.users.iter().any(|(u, _)| u.username == request.username) {
                return Err(ApiError::Request {
                    status: 400,
                    message: "Username already taken".to_string(),
                });
            }
            let user = User {
                id: state.users.len() as i64 + 1,
                username: request.username.clone(),
                email: request.email.clone(),
                role: request.role,
            };
            state.users.push((user.clone(), request.password.clone()));
            Ok(Self::auth(&user))
        }

        fn list_articles(
            &self,
            filters: &ArticleFilters,
            _token: Option<&str>,
        ) -> Result<Page<Article>, ApiError> {
            self.record(format!("list page={}", filters.page));
            let mut state = self.state.borrow_mut();
            state.last_filters = Some(filters.clone());
            let size = filters.size as usize;
            let total = state.articles.len();
            let total_pages = total.div_ceil(size) as u32;
            let content = state
                .articles
                .iter()
                .skip(filters.page as usize * size)
                .take(size)
                .cloned()
                .collect();
            Ok(Page {
                content,
                total_elements: total as u64,
                total_pages,
                size: filters.size,
                number: filters.page,
                first: filters.page == 0,
                last: filters.page + 1 >= total_pages,
            })
        }

        fn categories(&self) -> Vec<String> {
            vec!["Tech".to_string(), "Travel".to_string()]
        }

        fn get_article(&self, id: i64, _token: Option<&str>) -> Result<Article, ApiError> {
            self.record(format!("get {}", id));
            self.state
                .borrow()
                .articles
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .ok_or(ApiError::NotFound)
        }

        fn create_article(
            &self,
            request: &ArticleRequest,
            token: &str,
        ) -> Result<Article, ApiError> {
            let user = self.user_for_token(token)?;
            self.record(format!("create {}", request.title));
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            let article = Article {
                id: state.next_id,
                title: request.title.clone(),
                content: request.content.clone(),
                created_at: "2024-06-01T10:00:00".to_string(),
                updated_at: None,
                published_at: request.published_at.clone(),
                view_count: 0,
                author_id: Some(user.id),
                category: request.category.clone(),
                tags: request.tags.clone(),
                featured: request.featured.unwrap_or(false),
                pinned: request.pinned.unwrap_or(false),
            };
            state.articles.push(article.clone());
            Ok(article)
        }

        fn update_article(
            &self,
            id: i64,
            request: &ArticleRequest,
            token: &str,
        ) -> Result<Article, ApiError> {
            self.user_for_token(token)?;
            self.record(format!("update {}", id));
            let mut state = self.state.borrow_mut();
            let article = state
                .articles
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or(ApiError::NotFound)?;
            article.title = request.title.clone();
            article.content = request.content.clone();
            article.published_at = request.published_at.clone();
            Ok(article.clone())
        }

        fn delete_article(&self, id: i64, token: &str) -> Result<(), ApiError> {
            self.user_for_token(token)?;
            self.record(format!("delete {}", id));
            let mut state = self.state.borrow_mut();
            let before = state.articles.len();
            state.articles.retain(|a| a.id != id);
            if state.articles.len() == before {
                return Err(ApiError::NotFound);
            }
            Ok(())
        }

        fn profile(&self, token: &str) -> Result<UserProfile, ApiError> {
            let user = self.user_for_token(token)?;
            let count = self
                .state
                .borrow()
                .articles
                .iter()
                .filter(|a| a.author_id == Some(user.id))
                .count();
            Ok(UserProfile {
                id: user.id,
                username: user.username,
                email: user.email,
                role: user.role,
                article_count: count as i64,
            })
        }

        fn update_profile(
            &self,
            request: &UpdateProfileRequest,
            token: &str,
        ) -> Result<UserProfile, ApiError> {
            let user = self.user_for_token(token)?;
            self.record("update_profile".to_string());
            let mut state = self.state.borrow_mut();
            let (stored, _) = state
                .users
                .iter_mut()
                .find(|(u, _)| u.id == user.id)
                .ok_or(ApiError::NotFound)?;
            if let Some(name) = &request.username {
                stored.username = name.clone();
            }
            if let Some(email) = &request.email {
                stored.email = email.clone();
            }
            Ok(UserProfile {
                id: stored.id,
                username: stored.username.clone(),
                email: stored.email.clone(),
                role: stored.role,
                article_count: 0,
            })
        }
    }

    fn setup() -> (TempDir, FakeApi, Context) {
        let dir = TempDir::new().unwrap();
        let api = FakeApi::with_users(&[
            (1, "reader", Role::Reader),
            (2, "author", Role::Author),
            (3, "editor", Role::Editor),
            (4, "admin", Role::Admin),
        ]);
        api.add_article(10, Some(2));
        api.add_article(11, Some(3));
        api.add_article(12, None);
        let session = SessionStore::open(&dir.path().join("session.json")).unwrap();
        let ctx = Context::new(Box::new(api.clone()), session, 2, false);
        (dir, api, ctx)
    }

    fn login_as(ctx: &Context, name: &str) {
        login(ctx, name, "secret1").unwrap();
    }

    #[test]
    fn test_login_persists_session() {
        let (dir, _api, ctx) = setup();
        let out = login(&ctx, "author", "secret1").unwrap();
        assert_eq!(out, "Logged in as author [AUTHOR]");
        assert_eq!(ctx.token().as_deref(), Some("token-2"));

        let reopened = SessionStore::open(&dir.path().join("session.json")).unwrap();
        assert_eq!(reopened.user().unwrap().username, "author");
    }

    #[test]
    fn test_login_bad_password() {
        let (_dir, _api, ctx) = setup();
        let err = login(&ctx, "author", "wrong").unwrap_err();
        assert!(err.to_string().contains("invalid username or password"));
        assert!(ctx.user().is_none());
    }

    #[test]
    fn test_register_defaults_to_reader() {
        let (_dir, api, ctx) = setup();
        let out = register(&ctx, "newbie", "newbie@example.com", "secret1", None).unwrap();
        assert!(out.contains("[READER]"));
        assert!(api.calls().contains(&"register newbie READER".to_string()));
        assert_eq!(ctx.user().unwrap().role, Role::Reader);
    }

    #[test]
    fn test_register_validates_before_request() {
        let (_dir, api, ctx) = setup();
        let err = register(&ctx, "x", "not-an-email", "123", None).unwrap_err();
        assert!(err.to_string().contains("[username]"));
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_register_server_error_message() {
        let (_dir, _api, ctx) = setup();
        let err = register(&ctx, "author", "a2@example.com", "secret1", Some(Role::Author))
            .unwrap_err();
        assert!(err.to_string().contains("Username already taken"));
    }

    #[test]
    fn test_logout() {
        let (_dir, _api, ctx) = setup();
        assert_eq!(logout(&ctx).unwrap(), "Not logged in");
        login_as(&ctx, "reader");
        assert_eq!(logout(&ctx).unwrap(), "Logged out");
        assert!(ctx.user().is_none());
        assert_eq!(whoami(&ctx).unwrap(), "Not logged in");
    }

    #[test]
    fn test_reader_cannot_create() {
        let (_dir, api, ctx) = setup();
        login_as(&ctx, "reader");
        let fields = ArticleFields {
            title: Some("Nope".to_string()),
            ..Default::default()
        };
        let err = create(&ctx, fields).unwrap_err();
        assert_eq!(err.to_string(), "role READER cannot create articles");
        assert!(!api.calls().iter().any(|c| c.starts_with("create")));
    }

    #[test]
    fn test_anonymous_cannot_create() {
        let (_dir, api, ctx) = setup();
        let err = create(&ctx, ArticleFields::default()).unwrap_err();
        assert_eq!(err.to_string(), "log in to create articles");
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_author_creates_published_article() {
        let (_dir, api, ctx) = setup();
        login_as(&ctx, "author");
        let fields = ArticleFields {
            title: Some("  Hello  ".to_string()),
            content: Some("Body".to_string()),
            ..Default::default()
        };
        let out = create(&ctx, fields).unwrap();
        assert_eq!(out, "Created article #101 (published)");
        let state = api.state.borrow();
        let created = state.articles.iter().find(|a| a.id == 101).unwrap();
        assert_eq!(created.title, "Hello");
        assert_eq!(created.author_id, Some(2));
    }

    #[test]
    fn test_create_draft_and_blank_title() {
        let (_dir, api, ctx) = setup();
        login_as(&ctx, "editor");
        let fields = ArticleFields {
            title: Some("Later".to_string()),
            publish: Some(Publish::Draft),
            ..Default::default()
        };
        assert_eq!(create(&ctx, fields).unwrap(), "Created article #101 (draft)");

        let blank = ArticleFields {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        let err = create(&ctx, blank).unwrap_err();
        assert!(err.to_string().contains("[title]"));
        assert_eq!(
            api.calls().iter().filter(|c| c.starts_with("create")).count(),
            1
        );
    }

    #[test]
    fn test_author_edits_own_but_not_others() {
        let (_dir, api, ctx) = setup();
        login_as(&ctx, "author");
        let fields = ArticleFields {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(edit(&ctx, 10, fields.clone())
            .unwrap()
            .starts_with("Updated article #10"));

        let err = edit(&ctx, 11, fields.clone()).unwrap_err();
        assert_eq!(err.to_string(), "authors can only edit their own articles");
        let err = edit(&ctx, 12, fields).unwrap_err();
        assert_eq!(err.to_string(), "authors can only edit their own articles");
        assert!(!api.calls().contains(&"update 11".to_string()));
        assert!(!api.calls().contains(&"update 12".to_string()));
    }

    #[test]
    fn test_edit_keeps_unspecified_fields() {
        let (_dir, api, ctx) = setup();
        login_as(&ctx, "admin");
        let fields = ArticleFields {
            publish: Some(Publish::Draft),
            ..Default::default()
        };
        let out = edit(&ctx, 12, fields).unwrap();
        assert_eq!(out, "Updated article #12 (draft)");
        let state = api.state.borrow();
        let article = state.articles.iter().find(|a| a.id == 12).unwrap();
        assert_eq!(article.title, "Article 12");
        assert_eq!(article.content.as_deref(), Some("Some content"));
        assert!(article.published_at.is_none());
    }

    #[test]
    fn test_editor_deletes_any() {
        let (_dir, api, ctx) = setup();
        login_as(&ctx, "editor");
        assert_eq!(delete(&ctx, 10).unwrap(), "Deleted article #10 (Article 10)");
        assert_eq!(delete(&ctx, 12).unwrap(), "Deleted article #12 (Article 12)");
        assert_eq!(api.state.borrow().articles.len(), 1);
    }

    #[test]
    fn test_delete_missing_article() {
        let (_dir, _api, ctx) = setup();
        login_as(&ctx, "admin");
        let err = delete(&ctx, 999).unwrap_err();
        assert_eq!(err.to_string(), "article #999 not found");
    }

    #[test]
    fn test_reader_cannot_delete() {
        let (_dir, api, ctx) = setup();
        login_as(&ctx, "reader");
        let err = delete(&ctx, 10).unwrap_err();
        assert_eq!(err.to_string(), "role READER cannot delete articles");
        assert!(!api.calls().iter().any(|c| c.starts_with("delete")));
    }

    #[test]
    fn test_mutations_require_login() {
        let (_dir, api, ctx) = setup();
        let err = delete(&ctx, 10).unwrap_err();
        assert!(err.to_string().contains("not logged in"));
        assert!(edit(&ctx, 10, ArticleFields::default()).is_err());
        assert!(profile(&ctx).is_err());
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_list_and_paging() {
        let (_dir, api, ctx) = setup();
        let out = list(&ctx).unwrap();
        assert!(out.contains("Page 1 of 2 · 3 articles"));
        assert_eq!(*ctx.total_pages.borrow(), 2);

        let out = next_page(&ctx).unwrap();
        assert!(out.contains("Page 2 of 2"));
        assert_eq!(next_page(&ctx).unwrap(), "Already on the last page");
        prev_page(&ctx).unwrap();
        assert_eq!(prev_page(&ctx).unwrap(), "Already on the first page");
        assert_eq!(
            api.calls(),
            vec!["list page=0", "list page=1", "list page=0"]
        );
    }

    #[test]
    fn test_set_filter_resets_page() {
        let (_dir, api, ctx) = setup();
        list(&ctx).unwrap();
        next_page(&ctx).unwrap();
        let out = set_filter(&ctx, "keyword", "rust").unwrap();
        assert!(out.starts_with("Filters: keyword=rust"));
        let sent = api.state.borrow().last_filters.clone().unwrap();
        assert_eq!(sent.page, 0);
        assert_eq!(sent.keyword.as_deref(), Some("rust"));

        clear_filters(&ctx).unwrap();
        let sent = api.state.borrow().last_filters.clone().unwrap();
        assert_eq!(sent, ArticleFilters::new(2));
    }

    #[test]
    fn test_show_marks_permissions() {
        let (_dir, _api, ctx) = setup();
        login_as(&ctx, "author");
        assert!(show(&ctx, 10).unwrap().contains("Actions: edit, delete"));
        assert!(!show(&ctx, 11).unwrap().contains("Actions:"));
        assert_eq!(
            show(&ctx, 404).unwrap_err().to_string(),
            "article #404 not found"
        );
    }

    #[test]
    fn test_profile_update_refreshes_session() {
        let (_dir, _api, ctx) = setup();
        login_as(&ctx, "author");
        let request = UpdateProfileRequest {
            username: Some("writer".to_string()),
            ..Default::default()
        };
        let out = update_profile(&ctx, &request).unwrap();
        assert!(out.starts_with("Profile updated."));
        assert_eq!(ctx.user().unwrap().username, "writer");
        assert_eq!(ctx.token().as_deref(), Some("token-2"));

        let err = update_profile(&ctx, &UpdateProfileRequest::default()).unwrap_err();
        assert!(err.to_string().contains("change at least one field"));
    }

    #[test]
    fn test_profile_update_sends_trimmed_fields() {
        let (_dir, _api, ctx) = setup();
        login_as(&ctx, "author");
        let request = UpdateProfileRequest {
            username: Some("  writer ".to_string()),
            email: Some(" writer@example.com\t".to_string()),
            ..Default::default()
        };
        update_profile(&ctx, &request).unwrap();
        let user = ctx.user().unwrap();
        assert_eq!(user.username, "writer");
        assert_eq!(user.email, "writer@example.com");
    }

    #[test]
    fn test_profile_shows_article_count() {
        let (_dir, _api, ctx) = setup();
        login_as(&ctx, "author");
        assert!(profile(&ctx).unwrap().contains("Articles: 1"));
    }

    #[test]
    fn test_categories() {
        let (_dir, _api, ctx) = setup();
        assert_eq!(categories(&ctx).unwrap(), "Tech\nTravel");
    }

    #[test]
    fn test_json_output() {
        let (dir, api, _ctx) = setup();
        let session = SessionStore::open(&dir.path().join("session.json")).unwrap();
        let ctx = Context::new(Box::new(api), session, 10, true);
        let value: serde_json::Value = serde_json::from_str(&show(&ctx, 10).unwrap()).unwrap();
        assert_eq!(value["id"], 10);
        assert_eq!(value["authorId"], 2);
    }

    #[test]
    fn test_publish_parse() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(Publish::parse("", now).unwrap(), Publish::Draft);
        assert_eq!(Publish::parse("Draft", now).unwrap(), Publish::Draft);
        assert_eq!(
            Publish::parse("now", now).unwrap(),
            Publish::At("2024-06-01T12:30:00".to_string())
        );
        assert_eq!(
            Publish::parse("2024-07-04", now).unwrap(),
            Publish::At("2024-07-04T00:00:00".to_string())
        );
        assert_eq!(
            Publish::parse("2024-07-04T09:15", now).unwrap(),
            Publish::At("2024-07-04T09:15:00".to_string())
        );
        assert!(Publish::parse("next week", now).is_err());
    }
}
