use crate::QrFormSnapshot;
use std::fmt::Write;

/// Message shown in the blocking alert after a failed generation.
pub const FAILURE_ALERT: &str = "Error reaching the API. Ensure your backend is running.";

pub const SUBMIT_LABEL: &str = "Generate QR Code";
pub const BUSY_LABEL: &str = "Processing...";
pub const OWNER: &str = "Filip Ermenkov";

/// Everything the page needs for one render.
#[derive(Clone, Debug, Default)]
pub struct PageView {
    pub form: QrFormSnapshot,
    /// Raise the failure alert when the page loads.
    pub alert: bool,
    /// Input-level rejection, shown next to the field.
    pub validation: Option<String>,
}

impl PageView {
    pub fn new(form: QrFormSnapshot) -> Self {
        Self {
            form,
            ..Default::default()
        }
    }

    pub fn with_alert(mut self) -> Self {
        self.alert = true;
        self
    }

    pub fn with_validation(mut self, message: impl Into<String>) -> Self {
        self.validation = Some(message.into());
        self
    }
}

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; }
main { min-height: 100vh; display: flex; align-items: center; justify-content: center; background: #f2f2fc; padding: 1rem; box-sizing: border-box; }
.card { width: 100%; max-width: 36rem; background: #fdf9ff; border-radius: 2rem; box-shadow: 0 0 50px rgba(48,46,77,0.15); border: 1px solid #e8dfec; overflow: hidden; }
.header { background: #825432; padding: 3rem 2.5rem; text-align: center; }
.header h1 { margin: 0; font-size: 2.25rem; color: #fdf9ff; }
.header p { margin: 0.75rem 0 0; color: #e8dfec; opacity: 0.9; }
form { padding: 3rem; display: flex; flex-direction: column; gap: 2rem; }
label { display: block; font-weight: 600; color: #504e70; margin: 0 0 0.75rem 0.25rem; }
input { width: 100%; box-sizing: border-box; padding: 1rem 1.5rem; border-radius: 0.75rem; border: 2px solid #e8dfec; color: #302e4d; font-size: 1.125rem; outline: none; }
input:focus { border-color: #825432; }
.validation { color: #a33; margin: 0.5rem 0 0 0.25rem; }
button { width: 100%; background: #825432; color: #fff; border: 2px solid #825432; font-weight: 700; padding: 1rem; border-radius: 0.75rem; font-size: 1.25rem; cursor: pointer; }
button:hover { background: #fff; color: #825432; }
button:disabled { opacity: 0.5; }
.result { padding: 0 3rem 3rem; display: flex; justify-content: center; }
.result div { padding: 1.5rem; background: #fff; border-radius: 1rem; border: 1px solid #e8dfec; }
.result img { width: 16rem; height: 16rem; object-fit: contain; }
"#;

/// Renders the complete HTML document for `view`.
pub fn render_page(view: &PageView) -> String {
    let form = &view.form;
    let mut html = String::with_capacity(4096);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>QR Generator</title>\n");
    let _ = writeln!(html, "<style>{STYLE}</style>");
    html.push_str("</head>\n<body>\n<main>\n<div class=\"card\">\n");

    html.push_str("<div class=\"header\">\n<h1>QR Generator</h1>\n");
    html.push_str("<p>Secure URL-to-Code Conversion</p>\n");
    let _ = writeln!(html, "<p>Owner: {}</p>\n</div>", escape_html(OWNER));

    html.push_str("<form method=\"post\" action=\"/\">\n<div>\n");
    html.push_str("<label for=\"url\">Target URL</label>\n");
    let _ = writeln!(
        html,
        "<input id=\"url\" name=\"url\" type=\"url\" required placeholder=\"https://example.com\" value=\"{}\">",
        escape_html(&form.input)
    );
    if let Some(message) = &view.validation {
        let _ = writeln!(html, "<p class=\"validation\">{}</p>", escape_html(message));
    }
    html.push_str("</div>\n");

    let (disabled, label) = if form.busy {
        (" disabled", BUSY_LABEL)
    } else {
        ("", SUBMIT_LABEL)
    };
    let _ = writeln!(html, "<button type=\"submit\"{disabled}>{label}</button>");
    html.push_str("</form>\n");

    if let Some(image) = &form.qr_image {
        let _ = writeln!(
            html,
            "<div class=\"result\">\n<div><img src=\"{}\" alt=\"QR Code\"></div>\n</div>",
            escape_html(image)
        );
    }

    html.push_str("</div>\n</main>\n");

    // The submitter's button is busy for the whole round trip.
    let _ = writeln!(
        html,
        "<script>document.querySelector(\"form\").addEventListener(\"submit\", function () {{ \
         var button = this.querySelector(\"button[type=submit]\"); \
         button.disabled = true; button.textContent = {}; }});</script>",
        js_string(BUSY_LABEL)
    );

    if view.alert {
        let _ = writeln!(html, "<script>alert({});</script>", js_string(FAILURE_ALERT));
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// JSON string literal that is also safe inside a <script> element.
fn js_string(text: &str) -> String {
    serde_json::Value::from(text)
        .to_string()
        .replace("</", "<\\/")
}
