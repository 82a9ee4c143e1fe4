//! Placeholder rendering for stored message templates.
//!
//! Syntax: `{{field}}`, `{{#if condition}}...{{/if}}` and
//! `{{#each list}}...{{/each}}`. Blocks nest. A tag that cannot be resolved
//! renders as the fallback token. Report values are inserted verbatim and
//! never re-scanned for tags.

use tracing::warn;

use crate::types::report::{ClientAnalysis, ErrorDetail, ReportData};

pub type Predicate = fn(&ReportData) -> bool;

/// Conditions accepted by `{{#if ...}}`.
pub const CONDITIONS: [(&str, Predicate); 5] = [
    ("has_errors", |r: &ReportData| r.error_jobs > 0),
    ("has_warnings", |r: &ReportData| r.warning_jobs > 0),
    ("has_jobs", |r: &ReportData| r.total_jobs > 0),
    ("no_jobs", |r: &ReportData| r.total_jobs == 0),
    ("all_success", |r: &ReportData| r.total_jobs > 0 && r.success_jobs == r.total_jobs),
];

/// Lists accepted by `{{#each ...}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    ErrorDetails,
    ClientAnalysis,
}

impl ListKind {
    pub const ALL: [ListKind; 2] = [ListKind::ErrorDetails, ListKind::ClientAnalysis];

    pub fn name(self) -> &'static str {
        match self {
            ListKind::ErrorDetails => "error_details",
            ListKind::ClientAnalysis => "client_analysis",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(String),
    If { cond: String, body: Vec<Node> },
    Each { list: String, body: Vec<Node> },
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
enum Tag {
    Var(String),
    OpenIf(String),
    OpenEach(String),
    CloseIf,
    CloseEach,
}

impl Tag {
    fn parse(inner: &str) -> Self {
        let inner = inner.trim();
        if let Some(cond) = inner.strip_prefix("#if ") {
            Tag::OpenIf(cond.trim().to_string())
        } else if let Some(list) = inner.strip_prefix("#each ") {
            Tag::OpenEach(list.trim().to_string())
        } else if inner == "/if" {
            Tag::CloseIf
        } else if inner == "/each" {
            Tag::CloseEach
        } else {
            Tag::Var(inner.to_string())
        }
    }
}

/// Split `source` into text runs and `{{...}}` tags. A `{{` with no closing
/// `}}` is plain text.
fn tokenize(source: &str) -> Vec<Result<Tag, String>> {
    let mut out = Vec::new();
    let mut rest = source;
    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        if open > 0 {
            out.push(Err(rest[..open].to_string()));
        }
        out.push(Ok(Tag::parse(&rest[open + 2..open + 2 + close])));
        rest = &rest[open + 2 + close + 2..];
    }
    if !rest.is_empty() {
        out.push(Err(rest.to_string()));
    }
    out
}

struct Frame {
    open: Option<Tag>,
    nodes: Vec<Node>,
}

fn parse(source: &str) -> Vec<Node> {
    let mut stack = vec![Frame {
        open: None,
        nodes: Vec::new(),
    }];

    for token in tokenize(source) {
        match token {
            Err(text) => push(&mut stack, Node::Text(text)),
            Ok(Tag::Var(name)) => push(&mut stack, Node::Var(name)),
            Ok(tag @ (Tag::OpenIf(_) | Tag::OpenEach(_))) => stack.push(Frame {
                open: Some(tag),
                nodes: Vec::new(),
            }),
            Ok(close @ (Tag::CloseIf | Tag::CloseEach)) => {
                let matches = matches!(
                    (stack.last().and_then(|f| f.open.as_ref()), &close),
                    (Some(Tag::OpenIf(_)), Tag::CloseIf) | (Some(Tag::OpenEach(_)), Tag::CloseEach)
                );
                if !matches {
                    push(&mut stack, Node::Unresolved);
                    continue;
                }
                let Some(frame) = stack.pop() else { continue };
                let node = match frame.open {
                    Some(Tag::OpenIf(cond)) => Node::If {
                        cond,
                        body: frame.nodes,
                    },
                    Some(Tag::OpenEach(list)) => Node::Each {
                        list,
                        body: frame.nodes,
                    },
                    _ => continue,
                };
                push(&mut stack, node);
            }
        }
    }

    // Unclosed blocks: the opening tag is unresolved, its body stays inline.
    while stack.len() > 1 {
        let Some(frame) = stack.pop() else { break };
        push(&mut stack, Node::Unresolved);
        for node in frame.nodes {
            push(&mut stack, node);
        }
    }

    stack.pop().map(|f| f.nodes).unwrap_or_default()
}

fn push(stack: &mut [Frame], node: Node) {
    if let Some(frame) = stack.last_mut() {
        frame.nodes.push(node);
    }
}

/// Loop item currently in scope.
#[derive(Clone, Copy)]
enum Item<'a> {
    Error(&'a ErrorDetail),
    Client(&'a ClientAnalysis),
}

impl Item<'_> {
    fn field(&self, name: &str) -> Option<String> {
        match self {
            Item::Error(d) => Some(match name {
                "job_id" => d.job_id.clone(),
                "job_name" => d.job_name.clone(),
                "client" => d.client.clone(),
                "status" => d.status.clone(),
                "status_label" => d.status_label.clone(),
                "level" => d.level.clone(),
                "job_type" => d.job_type.clone(),
                "time" => d.time.clone(),
                "bytes" => d.bytes_formatted.clone(),
                _ => return None,
            }),
            Item::Client(c) => Some(match name {
                "client" => c.client.clone(),
                "total" => c.total.to_string(),
                "success" => c.success.to_string(),
                "errors" => c.errors.to_string(),
                "warnings" => c.warnings.to_string(),
                "success_rate" => c.success_rate.to_string(),
                "bytes" => c.bytes_formatted.clone(),
                _ => return None,
            }),
        }
    }
}

fn report_field(report: &ReportData, name: &str) -> Option<String> {
    Some(match name {
        "date" => report.date.clone(),
        "window_start" => report.window_start.clone(),
        "window_end" => report.window_end.clone(),
        "generated_at" => report.generated_at.clone(),
        "total_jobs" => report.total_jobs.to_string(),
        "error_jobs" => report.error_jobs.to_string(),
        "success_jobs" => report.success_jobs.to_string(),
        "warning_jobs" => report.warning_jobs.to_string(),
        "unknown_jobs" => report.unknown_jobs.to_string(),
        "error_rate" => report.error_rate.to_string(),
        "success_rate" => report.success_rate.to_string(),
        "total_bytes" => report.total_bytes_formatted.clone(),
        "total_files" => report.total_files.to_string(),
        "client_count" => report.clients.len().to_string(),
        "status_emoji" => status_emoji(report).to_string(),
        _ => return None,
    })
}

fn status_emoji(report: &ReportData) -> &'static str {
    if report.error_jobs > 0 {
        "❌"
    } else if report.warning_jobs > 0 {
        "⚠️"
    } else if report.total_jobs > 0 {
        "✅"
    } else {
        "ℹ️"
    }
}

fn condition(report: &ReportData, name: &str) -> Option<bool> {
    CONDITIONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, holds)| holds(report))
}

struct Renderer<'a> {
    report: &'a ReportData,
    fallback: &'a str,
}

impl<'a> Renderer<'a> {
    fn render_nodes(&self, nodes: &[Node], item: Option<Item<'a>>, out: &mut String) {
        let report: &'a ReportData = self.report;
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Var(name) => {
                    let value = item
                        .and_then(|it| it.field(name))
                        .or_else(|| report_field(report, name));
                    out.push_str(value.as_deref().unwrap_or(self.fallback));
                }
                Node::If { cond, body } => {
                    let truthy = condition(report, cond).unwrap_or_else(|| {
                        warn!(condition = %cond, "unknown template condition; treated as false");
                        false
                    });
                    if truthy {
                        self.render_nodes(body, item, out);
                    }
                }
                Node::Each { list, body } => match ListKind::from_name(list) {
                    Some(ListKind::ErrorDetails) => {
                        for detail in &report.error_details {
                            self.render_nodes(body, Some(Item::Error(detail)), out);
                        }
                    }
                    Some(ListKind::ClientAnalysis) => {
                        for client in &report.clients {
                            self.render_nodes(body, Some(Item::Client(client)), out);
                        }
                    }
                    None => warn!(list = %list, "unknown template list; rendered empty"),
                },
                Node::Unresolved => out.push_str(self.fallback),
            }
        }
    }
}

/// Render `template` against a report.
pub fn render(template: &str, report: &ReportData, fallback: &str) -> String {
    let nodes = parse(template);
    let mut out = String::with_capacity(template.len());
    Renderer { report, fallback }.render_nodes(&nodes, None, &mut out);
    out
}
