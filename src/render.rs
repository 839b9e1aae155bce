//! Plain-text rendering of articles, listings and profiles.

use crate::filters::ArticleFilters;
use crate::model::{parse_timestamp, Article, Page, PublicationStatus, User, UserProfile};
use crate::pagination::page_bar;
use crate::policy::ArticlePermissions;
use chrono::{DateTime, Utc};
use std::fmt::Write;

fn format_date(s: Option<&str>) -> String {
    s.and_then(parse_timestamp)
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn format_date_time(s: Option<&str>) -> String {
    s.and_then(parse_timestamp)
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default()
}

fn badges(article: &Article, now: DateTime<Utc>) -> Vec<&'static str> {
    let mut out = Vec::new();
    if article.pinned {
        out.push("pinned");
    }
    if article.featured {
        out.push("featured");
    }
    match article.status_at(now) {
        PublicationStatus::Published => {}
        status => out.push(status.label()),
    }
    out
}

fn allowed_actions(perms: ArticlePermissions) -> Vec<&'static str> {
    let mut actions = Vec::new();
    if perms.edit {
        actions.push("edit");
    }
    if perms.delete {
        actions.push("delete");
    }
    actions
}

/// Two-line summary used in listings
pub fn article_card(article: &Article, perms: ArticlePermissions, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let badges = badges(article, now)
        .iter()
        .map(|b| format!("[{}]", b))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = write!(out, "#{:<5} {}", article.id, article.title);
    if !badges.is_empty() {
        let _ = write!(out, "  {}", badges);
    }
    out.push('\n');

    let mut meta = Vec::new();
    if let Some(category) = article.category.as_deref().filter(|c| !c.is_empty()) {
        meta.push(category.to_string());
    }
    if let Some(tag) = article.tag_list().first() {
        meta.push(format!("#{}", tag));
    }
    let minutes = article.read_time_minutes();
    if minutes > 0 {
        meta.push(format!("{} min read", minutes));
    }
    meta.push(format!("{} views", article.view_count));
    let date = format_date(
        article
            .published_at
            .as_deref()
            .or(Some(article.created_at.as_str())),
    );
    if !date.is_empty() {
        meta.push(date);
    }
    let _ = write!(out, "       {}", meta.join(" · "));
    let actions = allowed_actions(perms);
    if !actions.is_empty() {
        let _ = write!(out, "  ({})", actions.join("/"));
    }
    out
}

/// Full article view
pub fn article_detail(article: &Article, perms: ArticlePermissions, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", article.title);
    let _ = writeln!(out, "{}", "=".repeat(article.title.chars().count().max(3)));

    let badges = badges(article, now);
    if !badges.is_empty() {
        let _ = writeln!(out, "[{}]", badges.join("] ["));
    }

    let _ = writeln!(out, "Created:   {}", format_date_time(Some(&article.created_at)));
    if let Some(updated) = article.updated_at.as_deref() {
        let _ = writeln!(out, "Updated:   {}", format_date_time(Some(updated)));
    }
    match article.status_at(now) {
        PublicationStatus::Draft => {}
        PublicationStatus::Scheduled => {
            let _ = writeln!(
                out,
                "Scheduled: {}",
                format_date_time(article.published_at.as_deref())
            );
        }
        PublicationStatus::Published => {
            let _ = writeln!(
                out,
                "Published: {}",
                format_date_time(article.published_at.as_deref())
            );
        }
    }
    if let Some(category) = article.category.as_deref().filter(|c| !c.is_empty()) {
        let _ = writeln!(out, "Category:  {}", category);
    }
    let tags = article.tag_list();
    if !tags.is_empty() {
        let _ = writeln!(out, "Tags:      {}", tags.join(", "));
    }
    if let Some(author) = article.author_id {
        let _ = writeln!(out, "Author:    #{}", author);
    }
    let _ = writeln!(
        out,
        "Views:     {} · {} min read",
        article.view_count,
        article.read_time_minutes()
    );
    out.push('\n');
    let content = article.content().trim();
    if content.is_empty() {
        out.push_str("(no content)\n");
    } else {
        let _ = writeln!(out, "{}", content);
    }
    let actions = allowed_actions(perms);
    if !actions.is_empty() {
        let _ = writeln!(out, "\nActions: {}", actions.join(", "));
    }
    out
}

/// A page of articles with its footer
pub fn article_list(
    page: &Page<Article>,
    filters: &ArticleFilters,
    user: Option<&User>,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();

    if filters.has_active(user.is_some()) {
        let active = filters
            .describe()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "Filters: {}  (/clear to reset)\n", active);
    }

    if page.content.is_empty() {
        out.push_str("No articles found.\n");
        return out;
    }

    for article in &page.content {
        let perms = ArticlePermissions::for_owner(user, article.author_id);
        let _ = writeln!(out, "{}", article_card(article, perms, now));
    }

    let _ = write!(
        out,
        "\nPage {} of {} · {} article{}",
        page.number + 1,
        page.total_pages.max(1),
        page.total_elements,
        if page.total_elements == 1 { "" } else { "s" }
    );
    if page.total_pages > 1 {
        let _ = write!(out, "\n{}", page_bar(page.number + 1, page.total_pages));
    }
    out.push('\n');
    out
}

pub fn profile(profile: &UserProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Username: {}", profile.username);
    let _ = writeln!(out, "Email:    {}", profile.email);
    let _ = writeln!(
        out,
        "Role:     {} ({})",
        profile.role.label(),
        profile.role.as_str()
    );
    let _ = writeln!(out, "Articles: {}", profile.article_count);
    out
}

pub fn whoami(user: Option<&User>) -> String {
    match user {
        Some(u) => format!("{} <{}> #{} [{}]", u.username, u.email, u.id, u.role),
        None => "Not logged in".to_string(),
    }
}
