/*!
Telling people that something happened to a homework.

Dispatch is fire-and-forget: `Notifier::dispatch()` returns immediately,
never reports failure to its caller, and never retries. Anything that goes
wrong is logged and otherwise dropped.
*/
use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;

use crate::{
    homework::{Homework, Status},
    user::Contact,
};

static NEW_TEMPLATE: &str = r#"<p>Hello, {{name}}!</p>
<p>You have a new homework: <b>{{homework}}</b>.</p>"#;

static UPDATED_TEMPLATE: &str = r#"<p>Hello, {{name}}!</p>
<p>Homework <b>{{homework}}</b> is now <i>{{status}}</i>.</p>"#;

static FINISHED_TEMPLATE: &str = r#"<p>Hello, {{name}}!</p>
<p>Homework <b>{{homework}}</b> has been finished and is ready to be checked.</p>"#;

static CHECKED_TEMPLATE: &str = r#"<p>Hello, {{name}}!</p>
<p>Homework <b>{{homework}}</b> has been checked.</p>"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// To the student, when a teacher assigns them homework.
    Created,
    /// To the teacher, when the student starts working.
    Started,
    /// To the teacher, when the student is done.
    Finished,
    /// To the student, when the teacher has checked it.
    Graded,
}

impl NoticeKind {
    pub fn template_name(&self) -> &'static str {
        match self {
            NoticeKind::Created  => "new",
            NoticeKind::Started  => "updated",
            NoticeKind::Finished => "finished",
            NoticeKind::Graded   => "checked",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            NoticeKind::Created  => "You have a new homework",
            NoticeKind::Started  => "Homework's status was changed",
            NoticeKind::Finished => "Homework is ready to be checked",
            NoticeKind::Graded   => "Homework has been checked",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub email: String,
    pub name: String,
    pub homework: String,
    pub status: Status,
}

impl Notice {
    pub fn new(kind: NoticeKind, to: &Contact, hw: &Homework) -> Notice {
        Notice {
            kind,
            email: to.email.clone(),
            name: to.name.clone(),
            homework: hw.name.clone(),
            status: hw.status,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn dispatch(&self, notice: Notice);
}

/// Only writes notices to the log. Used when no mail relay is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, notice: Notice) {
        log::info!(
            "Notice ({}) for {} <{}>: {:?} is {}.",
            notice.kind.template_name(), &notice.name, &notice.email,
            &notice.homework, &notice.status
        );
    }
}

/// What the mail relay expects to be `POST`ed to it.
#[derive(Debug, Serialize)]
struct Mail {
    email: String,
    subject: String,
    template: String,
}

/**
Renders notices into HTML email bodies and hands them off to a mail relay
over HTTP.

The body templates are built in, but any `new.html`, `updated.html`,
`finished.html`, or `checked.html` found in the optional template directory
replaces the corresponding built-in one.
*/
pub struct MailNotifier {
    url: String,
    client: reqwest::Client,
    templates: Handlebars<'static>,
}

impl MailNotifier {
    pub fn new(url: String, template_dir: Option<&Path>) -> Result<Self, String> {
        log::trace!("MailNotifier::new( {:?}, {:?} ) called.", &url, &template_dir);

        let mut h = Handlebars::new();
        for (name, text) in [
            ("new", NEW_TEMPLATE),
            ("updated", UPDATED_TEMPLATE),
            ("finished", FINISHED_TEMPLATE),
            ("checked", CHECKED_TEMPLATE),
        ] {
            h.register_template_string(name, text)
                .map_err(|e| format!("Error registering built-in template {:?}: {}", name, &e))?;
        }

        if let Some(dir) = template_dir {
            h.register_templates_directory(".html", dir)
                .map_err(|e| format!(
                    "Error registering templates directory {}: {}",
                    dir.display(), &e
                ))?;
        }

        Ok(Self { url, client: reqwest::Client::new(), templates: h })
    }

    fn render(&self, notice: &Notice) -> Result<String, String> {
        self.templates.render(notice.kind.template_name(), notice)
            .map_err(|e| format!(
                "Error rendering template {:?}: {}",
                notice.kind.template_name(), &e
            ))
    }
}

impl Notifier for MailNotifier {
    fn dispatch(&self, notice: Notice) {
        log::trace!("MailNotifier::dispatch( {:?} ) called.", &notice);

        let template = match self.render(&notice) {
            Ok(body) => body,
            Err(e) => {
                log::error!("Dropping notice {:?}: {}", &notice, &e);
                return;
            },
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("No runtime to send notice {:?} on: {}", &notice, &e);
                return;
            },
        };

        let mail = Mail {
            email: notice.email,
            subject: notice.kind.subject().to_owned(),
            template,
        };
        let client = self.client.clone();
        let url = self.url.clone();

        handle.spawn(async move {
            let res = client.post(&url)
                .json(&mail)
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match res {
                Ok(_) => {
                    log::debug!("Mail {:?} relayed to {}.", &mail.subject, &mail.email);
                },
                Err(e) => {
                    log::error!(
                        "Error relaying mail {:?} to {} via {}: {}",
                        &mail.subject, &mail.email, &url, &e
                    );
                },
            }
        });
    }
}

/// Keeps every notice it's handed, so tests can look at them.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct Recorder {
    notices: std::sync::Mutex<Vec<Notice>>,
}

#[cfg(test)]
impl Recorder {
    pub fn take(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(mut v) => std::mem::take(&mut *v),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
impl Notifier for Recorder {
    fn dispatch(&self, notice: Notice) {
        match self.notices.lock() {
            Ok(mut v) => v.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homework::sample;
    use crate::tests::ensure_logging;

    fn notice(kind: NoticeKind) -> Notice {
        let to = Contact { email: "sam@school.test".to_owned(), name: "Sam <3".to_owned() };
        let mut hw = sample(1, Status::Checked, 1, 2);
        hw.name = "Listening Ex. 3".to_owned();
        Notice::new(kind, &to, &hw)
    }

    #[test]
    fn built_in_templates_render() {
        ensure_logging();
        let m = MailNotifier::new("http://localhost:3001/email".to_owned(), None).unwrap();

        let body = m.render(&notice(NoticeKind::Graded)).unwrap();
        assert!(body.contains("Listening Ex. 3"));
        assert!(body.contains("has been checked"));
        // Names are HTML-escaped.
        assert!(body.contains("Sam &lt;3"));

        let body = m.render(&notice(NoticeKind::Started)).unwrap();
        assert!(body.contains("checked"));
    }

    #[test]
    fn dispatch_outside_a_runtime_is_dropped_quietly() {
        ensure_logging();
        let m = MailNotifier::new("http://localhost:3001/email".to_owned(), None).unwrap();
        m.dispatch(notice(NoticeKind::Created));
    }

    #[tokio::test]
    async fn dispatch_to_an_unreachable_relay_does_not_fail() {
        ensure_logging();
        let m = MailNotifier::new("http://127.0.0.1:9/email".to_owned(), None).unwrap();
        m.dispatch(notice(NoticeKind::Finished));
        LogNotifier.dispatch(notice(NoticeKind::Finished));
    }

    #[test]
    fn recorder_keeps_notices() {
        let r = Recorder::default();
        r.dispatch(notice(NoticeKind::Created));
        r.dispatch(notice(NoticeKind::Graded));
        let kinds: Vec<NoticeKind> = r.take().iter().map(|n| n.kind).collect();
        assert_eq!(vec![NoticeKind::Created, NoticeKind::Graded], kinds);
        assert!(r.take().is_empty());
    }
}
