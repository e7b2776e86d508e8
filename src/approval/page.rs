//! HTML for the decision pages.

use super::PendingArticle;
use crate::core::Article;
use crate::integrations::html_escape;

const STYLE: &str = "body{font-family:-apple-system,'Segoe UI',Roboto,sans-serif;max-width:900px;margin:30px auto;padding:0 16px;color:#333}\
button{font-size:16px;padding:10px 18px;margin-right:8px;border:0;border-radius:4px;color:#fff;cursor:pointer}\
.approve{background:#28a745}.deploy{background:#007bff}.reject{background:#dc3545}\
iframe{width:100%;height:70vh;border:1px solid #ddd;border-radius:4px}\
form{display:inline}";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n<title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        html_escape(title)
    )
}

fn token_field(token: Option<&str>) -> String {
    token.map_or_else(String::new, |t| format!("<input type=\"hidden\" name=\"token\" value=\"{}\">", html_escape(t)))
}

fn action_form(action: &str, id: &str, class: &str, label: &str, token: Option<&str>) -> String {
    format!(
        "<form method=\"post\" action=\"/action/{action}/{}\">{}<button class=\"{class}\" type=\"submit\">{label}</button></form>",
        urlencoding::encode(id),
        token_field(token)
    )
}

/// The decision page for one pending article.
pub fn decision_page(pending: &PendingArticle, token: Option<&str>) -> String {
    let article = &pending.article;
    let preview = pending.preview.as_ref().map_or_else(
        || "<p><em>No preview available.</em></p>".to_string(),
        |p| format!("<iframe src=\"{}\"></iframe>", html_escape(&p.url_path)),
    );

    let body = format!(
        "<h1>{title}</h1>\n<p>By {author} &middot; ID {id} &middot; requested {requested}</p>\n<p>{approve}{deploy}{reject}</p>\n{preview}",
        title = html_escape(article.title()),
        author = html_escape(article.author()),
        id = html_escape(&pending.id),
        requested = pending.requested_at.format("%Y-%m-%d %H:%M UTC"),
        approve = action_form("approve", &pending.id, "approve", "Approve", token),
        deploy = action_form("approve-deploy", &pending.id, "deploy", "Approve &amp; deploy", token),
        reject = action_form("reject", &pending.id, "reject", "Reject", token),
    );
    layout(&format!("Approve: {}", article.title()), &body)
}

/// Overview of every pending article.
pub fn pending_list(pending: &[PendingArticle], token: Option<&str>) -> String {
    if pending.is_empty() {
        return layout("Pending articles", "<h1>Pending articles</h1>\n<p>Nothing is waiting for approval.</p>");
    }

    let query = token.map_or_else(String::new, |t| format!("?token={}", urlencoding::encode(t)));
    let items: String = pending
        .iter()
        .map(|p| {
            format!(
                "<li><a href=\"/approve/{}{query}\">{}</a> by {} ({})</li>\n",
                urlencoding::encode(&p.id),
                html_escape(p.article.title()),
                html_escape(p.article.author()),
                html_escape(&p.id),
            )
        })
        .collect();
    layout("Pending articles", &format!("<h1>Pending articles</h1>\n<ul>\n{items}</ul>"))
}

/// Confirmation shown after a decision.
pub fn confirmation(heading: &str, article: &Article) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p>{} is now <strong>{}</strong>.</p>\n<p><a href=\"/\">Back to pending articles</a></p>",
        html_escape(heading),
        html_escape(article.title()),
        article.status_name(),
    );
    layout(heading, &body)
}
