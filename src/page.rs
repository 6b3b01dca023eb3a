use crate::storage::UploadRecord;

pub const TITLE: &str = "Road Sign Detection App";
pub const CLASSES_HEADING: &str = "This app detects 4 distinct classes of road signs:";
pub const SIGN_CLASSES: [&str; 4] = [
    "Traffic Light",
    "Stop Sign",
    "Speed Limit Sign",
    "Crosswalk Sign",
];
pub const NO_UPLOAD_ERROR: &str = "No image has been uploaded";
pub const LOAD_FAILED_ERROR: &str = "Failed to load the image from the local repository.";

/// Everything the single page can show. Each request renders it from scratch.
#[derive(Debug, Default)]
pub struct Page {
    pub upload: Option<UploadRecord>,
    pub show_original: bool,
    pub detected: Option<DetectedView>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct DetectedView {
    pub width: u32,
    pub height: u32,
    /// Appended to the image URL so browsers do not reuse an older result.
    pub version: u128,
}

impl Page {
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn render(&self) -> String {
        let mut html = String::with_capacity(2048);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", TITLE));
        html.push_str(STYLE);
        html.push_str("</head>\n<body>\n<main>\n");

        self.render_text_block(&mut html);
        self.render_controls(&mut html);

        if let Some(error) = &self.error {
            html.push_str(&format!(
                "<div class=\"error\" role=\"alert\">{}</div>\n",
                escape(error)
            ));
        }

        if self.show_original {
            html.push_str(
                "<figure><img src=\"/images/uploaded\" alt=\"Original Image\">\
                 <figcaption>Original Image</figcaption></figure>\n",
            );
        }

        if let Some(detected) = &self.detected {
            html.push_str(&format!(
                "<figure class=\"detected\"><img src=\"/images/detected?v={}\" \
                 width=\"{}\" height=\"{}\" alt=\"Detected objects\">\
                 <figcaption>Detected objects</figcaption></figure>\n",
                detected.version, detected.width, detected.height
            ));
        }

        html.push_str("</main>\n</body>\n</html>\n");
        html
    }

    fn render_text_block(&self, html: &mut String) {
        html.push_str(&format!("<h1>{}</h1>\n", TITLE));
        html.push_str(&format!("<h3>{}</h3>\n<ul>\n", CLASSES_HEADING));
        for class in SIGN_CLASSES {
            html.push_str(&format!("<li>{}</li>\n", class));
        }
        html.push_str("</ul>\n");
    }

    fn render_controls(&self, html: &mut String) {
        html.push_str(
            "<form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n\
             <label for=\"image\">Upload an image</label>\n\
             <input type=\"file\" id=\"image\" name=\"image\" accept=\".png,.jpeg,.jpg\">\n\
             <button type=\"submit\">Upload</button>\n\
             </form>\n",
        );

        if let Some(upload) = &self.upload {
            html.push_str(&format!(
                "<p class=\"upload\">{} ({} bytes)</p>\n",
                escape(&upload.original_name),
                upload.size
            ));
        }

        html.push_str(
            "<form action=\"/detect\" method=\"post\">\n\
             <button type=\"submit\">Detect Sign</button>\n\
             </form>\n",
        );
    }
}

const STYLE: &str = "<style>\
body{font-family:sans-serif;margin:0;background:#fff;color:#262730}\
main{max-width:730px;margin:0 auto;padding:3rem 1rem}\
form{margin:1rem 0}\
.error{background:#ffe0e0;color:#7d1a1a;padding:1rem;border-radius:.5rem}\
figure{margin:1rem 0}figure img{max-width:100%;height:auto}\
figcaption{color:#808495;font-size:.875rem;text-align:center}\
</style>\n";

fn escape(text: &str) -> String {
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
