use crate::storage::ContactRecord;

/// A rendered subject/body pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

/// Renders template text against a contact's fields
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, subject: &str, body: &str, contact: &ContactRecord) -> RenderedEmail;
}

/// `{{var}}` substitution over the contact variable catalog
///
/// | Variable | Value |
/// |----------|-------|
/// | `firma` | business name, else domain |
/// | `web`, `url` | domain, full URL |
/// | `kontakt`, `email` | contact person, email |
/// | `mesto`, `obor` | city, category |
/// | `score` | staleness score |
/// | `problemy`, `problemy_html`, `pocet_problemu` | outdated-tech bullets, `<ul>` list, count |
/// | `copyright`, `cms`, `rychlost` | copyright year, CMS, load time |
/// | `mobilni`, `ssl` | mobile / SSL sentence fragments |
/// | `odesilatel`, `firma_odesilatel` | sender name, sender company |
///
/// Unknown placeholders are left untouched.
#[derive(Debug, Clone)]
pub struct VariableRenderer {
    sender_name: String,
    sender_company: String,
}

impl VariableRenderer {
    pub fn new(sender_name: impl Into<String>, sender_company: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            sender_company: sender_company.into(),
        }
    }

    /// Builds the variable map for one contact
    pub fn variables(&self, contact: &ContactRecord) -> Vec<(&'static str, String)> {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        let issues_text = contact
            .outdated_tech
            .iter()
            .map(|issue| format!("• {}", issue))
            .collect::<Vec<_>>()
            .join("\n");
        let issues_html = if contact.outdated_tech.is_empty() {
            String::new()
        } else {
            let items: String = contact
                .outdated_tech
                .iter()
                .map(|issue| format!("<li>{}</li>", issue))
                .collect();
            format!("<ul>{}</ul>", items)
        };

        let firma = contact
            .business_name
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| contact.domain.clone())
            .unwrap_or_default();

        vec![
            ("firma", firma),
            ("web", text(&contact.domain)),
            ("url", text(&contact.url)),
            ("kontakt", text(&contact.contact_name)),
            ("email", text(&contact.email)),
            ("mesto", text(&contact.city)),
            ("obor", text(&contact.category)),
            ("score", contact.score.to_string()),
            ("problemy", issues_text),
            ("problemy_html", issues_html),
            ("pocet_problemu", contact.outdated_tech.len().to_string()),
            (
                "copyright",
                contact
                    .copyright_year
                    .map(|y| y.to_string())
                    .unwrap_or_default(),
            ),
            ("cms", text(&contact.cms)),
            (
                "rychlost",
                contact
                    .load_time
                    .filter(|t| *t > 0.0)
                    .map(|t| format!("{}s", t))
                    .unwrap_or_default(),
            ),
            (
                "mobilni",
                if contact.mobile_friendly {
                    "je optimalizována pro mobily"
                } else {
                    "není optimalizována pro mobily"
                }
                .to_string(),
            ),
            (
                "ssl",
                if contact.ssl_valid {
                    "má platný SSL"
                } else {
                    "nemá SSL certifikát"
                }
                .to_string(),
            ),
            ("odesilatel", self.sender_name.clone()),
            ("firma_odesilatel", self.sender_company.clone()),
        ]
    }
}

fn substitute(template: &str, variables: &[(&'static str, String)]) -> String {
    variables
        .iter()
        .fold(template.to_string(), |text, (key, value)| {
            text.replace(&format!("{{{{{}}}}}", key), value)
        })
}

impl TemplateRenderer for VariableRenderer {
    fn render(&self, subject: &str, body: &str, contact: &ContactRecord) -> RenderedEmail {
        let variables = self.variables(contact);
        RenderedEmail {
            subject: substitute(subject, &variables),
            body: substitute(body, &variables),
        }
    }
}
