//! Print-ready transform of a rendered surface.

use crate::export::ExportLayout;
use crate::report::surface::{escape, BASE_CSS};
use crate::report::RenderedSurface;

/// Build the print-ready HTML document for `surface`.
///
/// Non-printable blocks are dropped and page-break markers kept. The output
/// depends only on the surface and the layout.
pub fn print_ready(surface: &RenderedSurface, layout: &ExportLayout) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape(&surface.title)));
    html.push_str("<style>\n");
    html.push_str(&page_css(layout));
    html.push_str(BASE_CSS);
    html.push_str("</style>\n</head>\n<body>\n");

    for block in surface.blocks.iter().filter(|b| b.printable) {
        html.push_str(&format!(
            "<section id=\"{}\" class=\"block\">\n{}</section>\n",
            block.id, block.html
        ));
        if block.page_break_after {
            html.push_str("<div class=\"page-break\"></div>\n");
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn page_css(layout: &ExportLayout) -> String {
    let size = if is_a4(layout) {
        "A4".to_string()
    } else {
        format!("{}mm {}mm", layout.page_width_mm, layout.page_height_mm)
    };

    format!(
        "@page {{ size: {}; margin: {}mm; }}\n\
         html, body {{ background: {}; -webkit-print-color-adjust: exact; }}\n\
         body {{ width: {}px; }}\n\
         .page-break {{ page-break-after: always; break-after: page; }}\n",
        size,
        layout.margin_mm,
        layout.background,
        layout.css_width_px
    )
}

fn is_a4(layout: &ExportLayout) -> bool {
    (layout.page_width_mm - 210.0).abs() < 0.01 && (layout.page_height_mm - 297.0).abs() < 0.01
}
