//! Minimal PDF writer for single-image archives.
//!
//! Produces a PDF 1.4 file with one image XObject drawn on as many pages as
//! the image's height requires. Page `k` shows the image shifted up by `k`
//! page heights, so consecutive pages show consecutive slices.

use crate::export::raster::{Encoding, RasterImage};

const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Page geometry of the archive, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
}

impl PageGeometry {
    /// Height in mm the image occupies when scaled to the page width.
    pub fn image_height_mm(&self, image: &RasterImage) -> f64 {
        image.height as f64 * self.page_width_mm / image.width as f64
    }

    /// Number of pages needed for the image; always at least one.
    pub fn page_count(&self, image: &RasterImage) -> usize {
        let pages = (self.image_height_mm(image) / self.page_height_mm - 1e-9).ceil();
        (pages as usize).max(1)
    }

    /// Bottom edge of the image on each page, in mm from the page bottom.
    pub fn image_offsets_mm(&self, image: &RasterImage) -> Vec<f64> {
        let h = self.image_height_mm(image);
        (0..self.page_count(image))
            .map(|k| self.page_height_mm * (k as f64 + 1.0) - h)
            .collect()
    }
}

/// Render a single-image, multi-page PDF.
pub fn write_pdf(image: &RasterImage, geometry: PageGeometry, title: &str) -> Vec<u8> {
    let mut pdf = PdfBuilder::default();
    let offsets = geometry.image_offsets_mm(image);

    let page_w = geometry.page_width_mm * POINTS_PER_MM;
    let page_h = geometry.page_height_mm * POINTS_PER_MM;
    let image_h = geometry.image_height_mm(image) * POINTS_PER_MM;

    // Fixed object numbers: 1 catalog, 2 page tree, 3 info, 4 image,
    // then one (page, content) pair per page.
    let page_ids: Vec<usize> = (0..offsets.len()).map(|k| 5 + 2 * k).collect();

    pdf.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");

    let kids: Vec<String> = page_ids.iter().map(|id| format!("{} 0 R", id)).collect();
    pdf.object(
        2,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_ids.len()
        )
        .as_bytes(),
    );

    pdf.object(
        3,
        format!(
            "<< /Title ({}) /Producer (RfpAudit {}) >>",
            pdf_string(title),
            env!("CARGO_PKG_VERSION")
        )
        .as_bytes(),
    );

    let mut image_dict = format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8",
        image.width,
        image.height,
        image.color_space.pdf_name()
    );
    match image.encoding {
        Encoding::Jpeg => image_dict.push_str(" /Filter /DCTDecode"),
        Encoding::PngFlate => image_dict.push_str(&format!(
            " /Filter /FlateDecode /DecodeParms << /Predictor 15 /Colors {} /BitsPerComponent 8 /Columns {} >>",
            image.color_space.components(),
            image.width
        )),
    }
    pdf.stream(4, &image_dict, &image.data);

    for (k, offset_mm) in offsets.iter().enumerate() {
        let page_id = page_ids[k];
        let content_id = page_id + 1;

        pdf.object(
            page_id,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /XObject << /Im0 4 0 R >> >> /Contents {} 0 R >>",
                num(page_w),
                num(page_h),
                content_id
            )
            .as_bytes(),
        );

        let content = format!(
            "q {} 0 0 {} 0 {} cm /Im0 Do Q\n",
            num(page_w),
            num(image_h),
            num(offset_mm * POINTS_PER_MM)
        );
        pdf.stream(content_id, "<<", content.as_bytes());
    }

    pdf.finish(1, 3)
}

/// Format a coordinate with at most two decimals.
fn num(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Escape a PDF literal string, dropping non-ASCII characters.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

#[derive(Default)]
struct PdfBuilder {
    buf: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl PdfBuilder {
    fn ensure_header(&mut self) {
        if self.buf.is_empty() {
            self.buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        }
    }

    fn object(&mut self, id: usize, body: &[u8]) {
        self.ensure_header();
        self.offsets.push((id, self.buf.len()));
        self.buf
            .extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    /// Write a stream object. `dict` is the dictionary without its closing
    /// `>>`; the length entry is appended here.
    fn stream(&mut self, id: usize, dict: &str, data: &[u8]) {
        self.ensure_header();
        self.offsets.push((id, self.buf.len()));
        self.buf.extend_from_slice(
            format!("{} 0 obj\n{} /Length {} >>\nstream\n", id, dict, data.len()).as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self, root: usize, info: usize) -> Vec<u8> {
        self.offsets.sort_by_key(|(id, _)| *id);
        let size = self.offsets.last().map(|(id, _)| id + 1).unwrap_or(1);

        let xref_at = self.buf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", size);
        let mut next = 1;
        for (id, offset) in &self.offsets {
            while next < *id {
                xref.push_str("0000000000 65535 f \n");
                next += 1;
            }
            xref.push_str(&format!("{:010} 00000 n \n", offset));
            next = id + 1;
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, root, info, xref_at
        ));
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::raster::ColorSpace;

    const A4: PageGeometry = PageGeometry {
        page_width_mm: 210.0,
        page_height_mm: 297.0,
    };

    fn image(width: u32, height: u32, encoding: Encoding) -> RasterImage {
        RasterImage {
            width,
            height,
            color_space: ColorSpace::Rgb,
            encoding,
            data: vec![1, 2, 3, 4],
        }
    }

    fn count(haystack: &[u8], needle: &str) -> usize {
        haystack
            .windows(needle.len())
            .filter(|w| *w == needle.as_bytes())
            .count()
    }

    #[test]
    fn test_geometry_single_page() {
        let img = image(1000, 1000, Encoding::Jpeg);
        assert!((A4.image_height_mm(&img) - 210.0).abs() < 1e-9);
        assert_eq!(A4.page_count(&img), 1);
        assert!((A4.image_offsets_mm(&img)[0] - 87.0).abs() < 1e-9);
    }

    #[test]
    fn test_geometry_spills_across_pages() {
        let img = image(1000, 2000, Encoding::Jpeg);
        assert!((A4.image_height_mm(&img) - 420.0).abs() < 1e-9);
        assert_eq!(A4.page_count(&img), 2);

        let offsets = A4.image_offsets_mm(&img);
        assert!((offsets[0] + 123.0).abs() < 1e-9);
        assert!((offsets[1] - 174.0).abs() < 1e-9);
    }

    #[test]
    fn test_geometry_exact_fit() {
        let img = image(210, 297, Encoding::Jpeg);
        assert_eq!(A4.page_count(&img), 1);
        let img = image(210, 594, Encoding::Jpeg);
        assert_eq!(A4.page_count(&img), 2);
    }

    #[test]
    fn test_write_pdf_structure() {
        let img = image(1000, 2000, Encoding::PngFlate);
        let bytes = write_pdf(&img, A4, "County (RFP)");

        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        assert_eq!(count(&bytes, "/Type /Page "), 2);
        assert_eq!(count(&bytes, "/Count 2"), 1);
        assert_eq!(count(&bytes, "/Predictor 15 /Colors 3"), 1);
        assert_eq!(count(&bytes, "/MediaBox [0 0 595.28 841.89]"), 2);
        assert_eq!(count(&bytes, "County \\(RFP\\)"), 1);
    }

    #[test]
    fn test_write_pdf_jpeg_filter() {
        let img = image(800, 600, Encoding::Jpeg);
        let bytes = write_pdf(&img, A4, "x");
        assert_eq!(count(&bytes, "/Filter /DCTDecode"), 1);
        assert_eq!(count(&bytes, "/Type /Page "), 1);
    }

    #[test]
    fn test_num() {
        assert_eq!(num(595.2755), "595.28");
        assert_eq!(num(12.0), "12");
        assert_eq!(num(-0.001), "0");
    }
}
