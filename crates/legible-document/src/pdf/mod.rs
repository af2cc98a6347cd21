// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — page capability surface and invisible text layers.

pub mod pages;
pub mod text_layer;

use legible_core::error::Result;

/// Page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// The small set of page operations the text layer needs.
///
/// Page numbers are 1-indexed throughout.
pub trait PageSurface {
    fn page_count(&self) -> usize;

    /// Effective MediaBox size of a page, following inheritance.
    fn page_dimensions(&self, page: u32) -> Result<PageSize>;

    /// Make `resource_name` resolve to the standard Type1 font `base_font`,
    /// encoded as WinAnsiEncoding, in the page's font resources. No-op when
    /// the name is already bound.
    fn ensure_standard_font(&mut self, page: u32, resource_name: &str, base_font: &str) -> Result<()>;

    /// Append a content-stream fragment after the page's existing content.
    fn append_contents(&mut self, page: u32, fragment: Vec<u8>) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{Dictionary, Document, Object, Stream, dictionary};

    /// Build an in-memory PDF with one page per `(width, height)` entry.
    ///
    /// The first size is set on the /Pages node and inherited; pages with a
    /// different size carry their own MediaBox.
    pub fn document(sizes: &[(i64, i64)]) -> Document {
        let media_box = |w: i64, h: i64| {
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(w),
                Object::Integer(h),
            ])
        };
        let inherited = sizes.first().copied().unwrap_or((612, 792));

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for &(w, h) in sizes {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m\n".to_vec()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {},
            };
            if (w, h) != inherited {
                page.set("MediaBox", media_box(w, h));
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
                "MediaBox" => media_box(inherited.0, inherited.1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub fn bytes(sizes: &[(i64, i64)]) -> Vec<u8> {
        let mut doc = document(sizes);
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("serialise fixture");
        out
    }
}
