use std::{collections::HashMap, path::Path, sync::Arc};

use crate::error::{Error, Result};

/// Parses raw font bytes into a [`fontdue::Font`].
///
/// `collection_index` selects the face inside a font collection (`.ttc`) and is
/// ignored for single-face files.
pub fn parse_font(data: &[u8], collection_index: u32) -> Result<fontdue::Font> {
    fontdue::Font::from_bytes(
        data,
        fontdue::FontSettings {
            collection_index,
            scale: 40.0,
            load_substitutions: true,
        },
    )
    .map_err(Error::FontParse)
}

/// Reads a font file and parses its first face.
pub fn load_font_file(path: impl AsRef<Path>) -> Result<fontdue::Font> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_font(&data, 0)
}

/// Font discovery backed by `fontdb`.
///
/// Faces are registered in a `fontdb` database and only parsed with `fontdue`
/// the first time they are requested.
pub struct FontStorage {
    font_db: fontdb::Database,
    /// Faces from `font_db` that have been parsed so far.
    loaded_font: HashMap<fontdb::ID, Arc<fontdue::Font>, fxhash::FxBuildHasher>,
    system_fonts_loaded: bool,
}

impl Default for FontStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FontStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self {
            font_db: fontdb::Database::new(),
            loaded_font: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            system_fonts_loaded: false,
        }
    }
}

/// Loading fonts into fontdb.
impl FontStorage {
    /// Registers a font from binary data.
    pub fn load_font_binary(&mut self, data: impl Into<Vec<u8>>) {
        self.font_db.load_font_data(data.into());
    }

    /// Registers every font found in a directory.
    pub fn load_fonts_dir(&mut self, dir: impl AsRef<Path>) {
        self.font_db.load_fonts_dir(dir)
    }

    /// Registers the system fonts. Repeated calls are no-ops.
    pub fn load_system_fonts(&mut self) {
        if self.system_fonts_loaded {
            return;
        }
        self.font_db.load_system_fonts();
        self.system_fonts_loaded = true;
        log::debug!("loaded system fonts, {} faces registered", self.font_db.len());
    }

    pub fn is_empty(&self) -> bool {
        self.font_db.is_empty()
    }

    pub fn len(&self) -> usize {
        self.font_db.len()
    }

    /// Sets the family name for the "serif" generic family.
    pub fn set_serif_family(&mut self, family: impl Into<String>) {
        self.font_db.set_serif_family(family);
    }

    /// Sets the family name for the "sans-serif" generic family.
    pub fn set_sans_serif_family(&mut self, family: impl Into<String>) {
        self.font_db.set_sans_serif_family(family);
    }

    /// Sets the family name for the "cursive" generic family.
    pub fn set_cursive_family(&mut self, family: impl Into<String>) {
        self.font_db.set_cursive_family(family);
    }

    /// Sets the family name for the "fantasy" generic family.
    pub fn set_fantasy_family(&mut self, family: impl Into<String>) {
        self.font_db.set_fantasy_family(family);
    }

    /// Sets the family name for the "monospace" generic family.
    pub fn set_monospace_family(&mut self, family: impl Into<String>) {
        self.font_db.set_monospace_family(family);
    }

    /// Returns the family name `family` resolves to.
    pub fn family_name<'a>(&'a self, family: &'a fontdb::Family<'_>) -> &'a str {
        self.font_db.family_name(family)
    }
}

/// Get `Font`
impl FontStorage {
    /// Returns the best face for `families` at normal weight, stretch and style.
    pub fn query(&mut self, families: &[fontdb::Family<'_>]) -> Option<Arc<fontdue::Font>> {
        let id = self.font_db.query(&fontdb::Query {
            families,
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        })?;
        self.font(id)
    }

    /// Returns the first registered face that parses, if any.
    pub fn any_font(&mut self) -> Option<Arc<fontdue::Font>> {
        let ids: Vec<fontdb::ID> = self.font_db.faces().map(|face| face.id).collect();
        ids.into_iter().find_map(|id| self.font(id))
    }

    /// Retrieves a parsed font by ID, parsing it if necessary.
    pub fn font(&mut self, id: fontdb::ID) -> Option<Arc<fontdue::Font>> {
        use std::collections::hash_map::Entry;

        match self.loaded_font.entry(id) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let font_result = self
                    .font_db
                    .with_face_data(id, |data, index| parse_font(data, index))?;

                match font_result {
                    Ok(font) => Some(Arc::clone(entry.insert(Arc::new(font)))),
                    Err(e) => {
                        log::error!("Failed to load font (id: {:?}): {}", id, e);
                        None
                    }
                }
            }
        }
    }
}
