//! Embedded static resources.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `serve` - Preview client script (preview.js) and the artifact view page
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{PREVIEW_JS, PreviewVars};
//!
//! let js = PREVIEW_JS.render(&PreviewVars { events_port: 35730 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// URL the preview script is served from.
    pub const PREVIEW_JS_PATH: &str = "/__vitae/preview.js";

    /// Variables for preview.js.
    pub struct PreviewVars {
        pub events_port: u16,
    }

    impl TemplateVars for PreviewVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__VITAE_EVENTS_PORT__", &self.events_port.to_string())
        }
    }

    /// Live reload client with event stream port injection.
    pub const PREVIEW_JS: Template<PreviewVars> = Template::new(include_str!("serve/preview.js"));

    /// Variables for the artifact view page.
    pub struct ViewVars {
        pub title: String,
        /// Artifact URL loaded (and reloaded) in the view's frame.
        pub src: &'static str,
    }

    impl TemplateVars for ViewVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__VITAE_TITLE__", &crate::utils::html::escape(&self.title))
                .replace("__VITAE_SRC__", &crate::utils::html::escape(self.src))
        }
    }

    /// Page framing a derived artifact so it stays subscribed to reloads.
    pub const VIEW_HTML: Template<ViewVars> = Template::new(include_str!("serve/view.html"));

    /// Script tag inserted into served documents.
    pub fn script_tag() -> String {
        format!(r#"<script src="{PREVIEW_JS_PATH}" defer></script>"#)
    }
}
