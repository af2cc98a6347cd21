// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lopdf-backed page surface — page geometry, font resources, content streams.

use std::collections::BTreeMap;
use std::path::Path;

use legible_core::error::{LegibleError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, instrument};

use super::{PageSize, PageSurface};

/// Upper bound on /Parent hops when resolving inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// A loaded PDF exposing the [`PageSurface`] operations.
pub struct PdfPages {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
    /// Standard fonts already added to this document, by base font name.
    fonts: BTreeMap<String, ObjectId>,
}

impl PdfPages {
    // -- Construction ---------------------------------------------------------

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path)
            .map_err(|err| LegibleError::Pdf(format!("failed to open {}: {err}", path.display())))?;
        Ok(Self::from_document(document))
    }

    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| LegibleError::Pdf(format!("failed to load PDF from memory: {err}")))?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: Document) -> Self {
        let pages = document.get_pages();
        debug!(pages = pages.len(), "PDF loaded");
        Self {
            document,
            pages,
            fonts: BTreeMap::new(),
        }
    }

    // -- Output ---------------------------------------------------------------

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.document
            .save(path)
            .map_err(|err| LegibleError::Pdf(format!("failed to write {}: {err}", path.display())))?;
        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.document
            .save_to(&mut out)
            .map_err(|err| LegibleError::Pdf(format!("failed to serialise PDF: {err}")))?;
        Ok(out)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    // -- Helpers --------------------------------------------------------------

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages.get(&page).copied().ok_or_else(|| {
            LegibleError::Pdf(format!(
                "page {page} out of range (document has {} pages)",
                self.pages.len()
            ))
        })
    }

    /// Look up `key` on the page, then on each ancestor in the page tree.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = page_id;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let dict = self.document.get_dictionary(current).ok()?;
            if let Ok(value) = dict.get(key) {
                return self.resolve(value);
            }
            current = dict.get(b"Parent").ok()?.as_reference().ok()?;
        }
        None
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Make the dictionary stored under `key` in object `owner` an indirect
    /// object and return its id, creating an empty one when absent.
    ///
    /// `fallback` seeds a newly created dictionary (used for inherited page
    /// resources so they are not shadowed).
    fn indirect_dictionary(
        &mut self,
        owner: ObjectId,
        key: &[u8],
        fallback: Option<Dictionary>,
    ) -> Result<ObjectId> {
        let existing = self
            .document
            .get_dictionary(owner)
            .map_err(|err| LegibleError::Pdf(format!("object {owner:?} is not a dictionary: {err}")))?
            .get(key)
            .ok()
            .cloned();

        let (id, relink) = match existing {
            Some(Object::Reference(id)) => (id, false),
            Some(Object::Dictionary(dict)) => (self.document.add_object(dict), true),
            Some(_) => {
                return Err(LegibleError::Pdf(format!(
                    "/{} of object {owner:?} is not a dictionary",
                    String::from_utf8_lossy(key)
                )));
            }
            None => (self.document.add_object(fallback.unwrap_or_else(Dictionary::new)), true),
        };

        if relink {
            self.document
                .get_dictionary_mut(owner)
                .map_err(|err| LegibleError::Pdf(format!("object {owner:?}: {err}")))?
                .set(key.to_vec(), Object::Reference(id));
        }
        Ok(id)
    }

    fn standard_font(&mut self, base_font: &str) -> ObjectId {
        if let Some(id) = self.fonts.get(base_font) {
            return *id;
        }
        let id = self.document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font,
            "Encoding" => "WinAnsiEncoding",
        });
        self.fonts.insert(base_font.to_owned(), id);
        id
    }
}

impl PageSurface for PdfPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_dimensions(&self, page: u32) -> Result<PageSize> {
        let page_id = self.page_id(page)?;
        let media_box = self
            .inherited(page_id, b"MediaBox")
            .and_then(|obj| obj.as_array().ok())
            .ok_or_else(|| LegibleError::Pdf(format!("page {page} has no media box")))?;

        let coords: Vec<f64> = media_box
            .iter()
            .filter_map(|v| self.resolve(v))
            .filter_map(|v| v.as_float().ok())
            .map(f64::from)
            .collect();
        let &[x1, y1, x2, y2] = coords.as_slice() else {
            return Err(LegibleError::Pdf(format!("page {page} has a malformed media box")));
        };

        Ok(PageSize {
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        })
    }

    fn ensure_standard_font(&mut self, page: u32, resource_name: &str, base_font: &str) -> Result<()> {
        let page_id = self.page_id(page)?;

        let inherited_resources = self
            .inherited(page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .cloned();
        let resources_id = self.indirect_dictionary(page_id, b"Resources", inherited_resources)?;
        let fonts_id = self.indirect_dictionary(resources_id, b"Font", None)?;

        let already_bound = self
            .document
            .get_dictionary(fonts_id)
            .map(|fonts| fonts.has(resource_name.as_bytes()))
            .unwrap_or(false);
        if already_bound {
            return Ok(());
        }

        let font_id = self.standard_font(base_font);
        self.document
            .get_dictionary_mut(fonts_id)
            .map_err(|err| LegibleError::Pdf(format!("font resources: {err}")))?
            .set(resource_name, Object::Reference(font_id));
        debug!(page, resource_name, base_font, "font resource registered");
        Ok(())
    }

    fn append_contents(&mut self, page: u32, fragment: Vec<u8>) -> Result<()> {
        let page_id = self.page_id(page)?;
        let stream_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), fragment));
        let new_ref = Object::Reference(stream_id);

        let existing = self
            .document
            .get_dictionary(page_id)
            .map_err(|err| LegibleError::Pdf(format!("page {page}: {err}")))?
            .get(b"Contents")
            .ok()
            .cloned();

        let updated = match existing {
            None => new_ref,
            Some(Object::Reference(id)) => match self.document.get_object_mut(id) {
                // Indirect array of streams: extend it in place.
                Ok(Object::Array(items)) => {
                    items.push(new_ref);
                    return Ok(());
                }
                _ => Object::Array(vec![Object::Reference(id), new_ref]),
            },
            Some(Object::Array(mut items)) => {
                items.push(new_ref);
                Object::Array(items)
            }
            Some(_) => {
                return Err(LegibleError::Pdf(format!(
                    "page {page} has an unexpected /Contents entry"
                )));
            }
        };

        self.document
            .get_dictionary_mut(page_id)
            .map_err(|err| LegibleError::Pdf(format!("page {page}: {err}")))?
            .set("Contents", updated);
        Ok(())
    }
}
