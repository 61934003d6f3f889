//! Email Template Resolver
//!
//! Handlebars-based rendering of notification emails. The registry is
//! populated once at startup from a static key/template mapping and never
//! changes afterwards.

use handlebars::Handlebars;
use serde::Serialize;

use stratus_utils::{NotifyError, NotifyResult};

/// Built-in templates, keyed by the `key` field of a send request.
const TEMPLATES: &[(&str, &str)] = &[
    (
        "expiration",
        r#"<html lang='en'>
<head><meta charset='utf-8' /></head>
<body>
<h1 class='title'>Stratus Cloud trial expires soon</h1>
<p class='content'>
Hi,
<br />
<br />
This is to inform you that your Stratus Cloud trial (deployment {{id}}) will expire on {{date}}.
To learn how to convert it to a production deployment, please <a href="{{link}}">click here</a>.
<br />
<br />
Kind regards,
<br />
Your Stratus Team
</p>
</body>
</html>"#,
    ),
    (
        "welcome",
        r#"<html lang='en'>
<head><meta charset='utf-8' /></head>
<body>
<h1 class='title'>Welcome to Stratus Cloud</h1>
<p class='content'>
Hi,
<br />
<br />
Your Stratus Cloud deployment {{id}} was created on {{date}}.
You can manage it <a href="{{link}}">here</a>.
<br />
<br />
Kind regards,
<br />
Your Stratus Team
</p>
</body>
</html>"#,
    ),
];

/// Template engine
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        for (key, template) in TEMPLATES {
            handlebars
                .register_template_string(key, template)
                .unwrap_or_else(|e| panic!("invalid built-in template '{}': {}", key, e));
        }

        Self { handlebars }
    }

    pub fn has_template(&self, key: &str) -> bool {
        self.handlebars.get_template(key).is_some()
    }

    /// Render the template behind `key` with the given body data.
    pub fn render<T: Serialize>(&self, key: &str, data: &T) -> NotifyResult<String> {
        if !self.has_template(key) {
            return Err(NotifyError::template_not_found(key));
        }

        self.handlebars
            .render(key, data)
            .map_err(|e| NotifyError::internal(format!("template render failed: {}", e)))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
