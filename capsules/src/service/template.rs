use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use common::entities::{capsule::Capsule, letter::Letter};

/// Renders the two emails a capsule produces. Implementations must be pure:
/// nothing in delivery depends on what they return beyond the recipient.
pub trait LetterFormatter: Send + Sync {
    fn delivery(&self, capsule: &Capsule) -> Letter;
    fn confirmation(&self, capsule: &Capsule) -> Letter;
}

pub struct HtmlLetterFormatter {
    offset: FixedOffset,
}

impl HtmlLetterFormatter {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    fn written_on(&self, created_at: i64) -> NaiveDate {
        let secs = created_at.div_euclid(1_000_000);
        let nanos = (created_at.rem_euclid(1_000_000) * 1_000) as u32;
        let created: DateTime<Utc> = Utc.timestamp_opt(secs, nanos).single().unwrap_or_else(Utc::now);
        created.with_timezone(&self.offset).date_naive()
    }
}

pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escapes the letter and turns its line breaks into `<br>`.
pub fn body_html(body: &str) -> String {
    body.split('\n')
        .map(|line| escape_html(line.strip_suffix('\r').unwrap_or(line)))
        .collect::<Vec<_>>()
        .join("<br>")
}

impl LetterFormatter for HtmlLetterFormatter {
    fn delivery(&self, capsule: &Capsule) -> Letter {
        let marker = capsule.mood.marker();
        let written = long_date(self.written_on(capsule.created_at));
        let subject = escape_html(&capsule.subject);

        let message = format!(
            r#"<div style="font-family: 'Helvetica Neue', Arial, sans-serif; max-width: 500px; margin: 0 auto; background: #14142e; color: #f0eef6; border-radius: 16px; overflow: hidden;">
    <div style="background: linear-gradient(135deg, #f472b6, #7c5bf5); padding: 30px; text-align: center;">
        <div style="font-size: 3rem;">💌</div>
        <h1 style="color: white; font-size: 1.5rem; margin: 10px 0 0;">A letter from your past self</h1>
        <p style="color: rgba(255,255,255,0.8); font-size: 0.9rem; margin-top: 8px;">A message from you on {written}</p>
    </div>
    <div style="padding: 25px;">
        <div style="background: rgba(255,255,255,0.05); border: 1px solid rgba(124,91,245,0.2); border-radius: 12px; padding: 20px; margin-bottom: 16px;">
            <p style="color: #a78bfa; font-weight: bold; margin-bottom: 4px;">{marker} {subject}</p>
            <p style="color: #6b6890; font-size: 0.8rem;">From {name} | Mood: {marker}</p>
        </div>
        <div style="background: rgba(255,255,255,0.03); border: 1px solid rgba(255,255,255,0.08); border-radius: 12px; padding: 20px; line-height: 1.8; color: #d1d0e0; font-size: 0.95rem;">{body}</div>
        <div style="text-align: center; margin-top: 24px; padding-top: 16px; border-top: 1px solid rgba(124,91,245,0.2);">
            <p style="color: #6b6890; font-size: 0.8rem;">🕰️ This letter was written on {written}</p>
        </div>
    </div>
</div>"#,
            name = escape_html(&capsule.name),
            body = body_html(&capsule.body),
        );

        Letter {
            email: capsule.email.clone(),
            subject: format!("💌 A letter from your past self has arrived: \"{}\"", capsule.subject),
            message,
        }
    }

    fn confirmation(&self, capsule: &Capsule) -> Letter {
        let marker = capsule.mood.marker();
        let delivery = long_date(capsule.delivery_date);

        let message = format!(
            r#"<div style="font-family: 'Helvetica Neue', Arial, sans-serif; max-width: 500px; margin: 0 auto; background: #14142e; color: #f0eef6; border-radius: 16px; overflow: hidden;">
    <div style="background: linear-gradient(135deg, #7c5bf5, #5b34d4); padding: 30px; text-align: center;">
        <div style="font-size: 3rem;">{marker}</div>
        <h1 style="color: white; font-size: 1.5rem; margin: 10px 0 0;">Capsule sealed!</h1>
    </div>
    <div style="padding: 25px;">
        <p style="color: #9d9bb8; font-size: 0.9rem;">{name}, your letter has been sealed.</p>
        <div style="background: rgba(255,255,255,0.05); border: 1px solid rgba(124,91,245,0.2); border-radius: 12px; padding: 16px; margin: 16px 0;">
            <p style="font-weight: bold; color: #a78bfa; margin-bottom: 8px;">📬 Arrives on: {delivery}</p>
            <p style="font-weight: bold; color: #f0eef6;">Subject: {subject}</p>
        </div>
        <p style="color: #6b6890; font-size: 0.85rem; text-align: center; margin-top: 20px;">Until then, look forward to it ✨</p>
    </div>
</div>"#,
            name = escape_html(&capsule.name),
            subject = escape_html(&capsule.subject),
        );

        Letter {
            email: capsule.email.clone(),
            subject: format!("📦 Your capsule has been sealed: \"{}\"", capsule.subject),
            message,
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
    use common::entities::capsule::{Capsule, CreateCapsule, Mood};

    use super::{body_html, escape_html, HtmlLetterFormatter, LetterFormatter};

    fn capsule() -> Capsule {
        // 2024-01-01T20:00:00Z is already January 2nd at +09:00
        let created_at = Utc
            .with_ymd_and_hms(2024, 1, 1, 20, 0, 0)
            .unwrap()
            .timestamp_micros();
        Capsule::seal(
            CreateCapsule {
                name: "Mio".to_string(),
                email: "mio@example.com".to_string(),
                subject: "Open <later>".to_string(),
                body: "First line\nSecond & last".to_string(),
                mood: Some(Mood::Nostalgic),
                delivery_date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            },
            created_at,
        )
    }

    fn formatter() -> HtmlLetterFormatter {
        HtmlLetterFormatter::new(FixedOffset::east_opt(9 * 3600).unwrap())
    }

    #[test]
    fn body_keeps_line_breaks_and_escapes() {
        assert_eq!(body_html("a\nb<c>"), "a<br>b&lt;c&gt;");
        assert_eq!(body_html("a\r\nb\n"), "a<br>b<br>");
        assert_eq!(body_html("\n\nend"), "<br><br>end");
        assert_eq!(escape_html("\"q\" & 'a'"), "&quot;q&quot; &amp; &#39;a&#39;");
    }

    #[test]
    fn delivery_letter_carries_subject_body_and_mood() {
        let letter = formatter().delivery(&capsule());

        assert_eq!(letter.email, "mio@example.com");
        assert!(letter.subject.contains("Open <later>"));
        assert!(letter.message.contains("First line<br>Second &amp; last"));
        assert!(letter.message.contains("🥹 Open &lt;later&gt;"));
        assert!(letter.message.contains("January 2, 2024"));
    }

    #[test]
    fn confirmation_letter_names_delivery_date() {
        let letter = formatter().confirmation(&capsule());

        assert!(letter.subject.contains("Open <later>"));
        assert!(letter.message.contains("March 9, 2025"));
        assert!(letter.message.contains("Mio, your letter has been sealed."));
        assert!(!letter.message.contains("Second & last"));
    }
}
