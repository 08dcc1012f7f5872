//! OCR markup scanning and page-image URL construction.
//!
//! Corpus raw text may carry inline OCR attributes: `coords="x,y,w,h"` word
//! boxes and `<w p=N>` page anchors. Token texts stay clean; these helpers
//! scan raw-text slices bounded by token byte offsets.

/// Parse every `coords="x,y,w,h"` attribute in a raw-text slice.
pub fn parse_coords(slice: &str) -> Vec<[i64; 4]> {
    let mut out = Vec::new();
    let mut rest = slice;
    while let Some(at) = rest.find("coords=\"") {
        rest = &rest[at + 8..];
        let Some(close) = rest.find('"') else { break };
        let body = &rest[..close];
        rest = &rest[close + 1..];
        let nums: Vec<i64> = body.split(',').filter_map(|n| n.trim().parse().ok()).collect();
        if let [x, y, w, h] = nums[..] {
            out.push([x, y, w, h]);
        }
    }
    out
}

/// The first `<w p=N>` page anchor in a raw-text slice.
pub fn page_anchor(slice: &str) -> Option<u32> {
    let mut rest = slice;
    while let Some(at) = rest.find("<w p=") {
        rest = &rest[at + 5..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() && rest[digits.len()..].starts_with('>') {
            return digits.parse().ok();
        }
    }
    None
}

/// Union bounding box over every coords attribute in the slice.
pub fn bounding_box(slice: &str) -> Option<[i64; 4]> {
    let boxes = parse_coords(slice);
    let first = boxes.first()?;
    let mut x0 = first[0];
    let mut y0 = first[1];
    let mut x1 = first[0] + first[2];
    let mut y1 = first[1] + first[3];
    for b in &boxes[1..] {
        x0 = x0.min(b[0]);
        y0 = y0.min(b[1]);
        x1 = x1.max(b[0] + b[2]);
        y1 = y1.max(b[1] + b[3]);
    }
    Some([x0, y0, x1 - x0, y1 - y0])
}

/// Build a link to the matched passage: a media-fragment URL when word boxes
/// exist, a page-anchored URL when only page anchors do, the bare metadata
/// URL otherwise.
pub fn page_url(meta_url: Option<&str>, slice: &str) -> Option<String> {
    let url = meta_url?;
    if let Some([x, y, w, h]) = bounding_box(slice) {
        return Some(format!("{url}#xywh={x},{y},{w},{h}"));
    }
    if let Some(p) = page_anchor(slice) {
        return Some(format!("{url}#page={p}"));
    }
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_attributes_parse() {
        let slice = r#"fox<coords="10,20,30,40"> jumps<coords="50,20,35,40">"#;
        assert_eq!(
            parse_coords(slice),
            vec![[10, 20, 30, 40], [50, 20, 35, 40]]
        );
    }

    #[test]
    fn malformed_coords_are_skipped() {
        assert!(parse_coords(r#"coords="1,2,3""#).is_empty());
        assert!(parse_coords(r#"coords="a,b,c,d""#).is_empty());
        assert!(parse_coords("no attributes here").is_empty());
    }

    #[test]
    fn bounding_box_is_union() {
        let slice = r#"a<coords="10,20,30,40"> b<coords="50,10,35,40">"#;
        assert_eq!(bounding_box(slice), Some([10, 10, 75, 50]));
    }

    #[test]
    fn page_anchor_found_amid_text() {
        assert_eq!(page_anchor("words <w p=3> more words"), Some(3));
        assert_eq!(page_anchor("words <w p=> broken"), None);
        assert_eq!(page_anchor("plain text"), None);
    }

    #[test]
    fn url_prefers_bbox_then_anchor_then_bare() {
        let url = Some("http://archive.example/doc");
        let with_coords = r#"x<coords="1,2,3,4">"#;
        assert_eq!(
            page_url(url, with_coords).unwrap(),
            "http://archive.example/doc#xywh=1,2,3,4"
        );
        assert_eq!(
            page_url(url, "a <w p=7> b").unwrap(),
            "http://archive.example/doc#page=7"
        );
        assert_eq!(page_url(url, "plain").unwrap(), "http://archive.example/doc");
        assert_eq!(page_url(None, with_coords), None);
    }
}
