//! Collections of databases and the evaluator-facing database context.
//!
//! A collection scans directories for `*.mst` files and opens databases on
//! demand; a [`DatabaseContext`] wraps one open database and answers the
//! formatting language's cross-database needs: `ref()` record loads with a
//! per-database cache, `l()`/`npost()` lookups, and `proc` gizmo tables.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use isisdb_core::config::Config;
use isisdb_core::record::Record;
use isisdb_store::inverted::fold_key;
use isisdb_store::{InvertedIndex, MasterFile};
use pft_lang::{Database, DatabaseError};

use crate::Result;

pub struct Collection {
    pub name: String,
    dirs: Vec<PathBuf>,
    config: Config,
    databases: RefCell<HashMap<String, Rc<RefCell<MasterFile>>>>,
}

impl Collection {
    /// Open every master file under the given directories. Files that fail
    /// to open are skipped with a warning.
    pub fn open(
        name: impl Into<String>,
        dirs: &[impl AsRef<Path>],
        config: Config,
    ) -> Result<Rc<Self>> {
        let collection = Rc::new(Self {
            name: name.into(),
            dirs: dirs.iter().map(|d| d.as_ref().to_owned()).collect(),
            config,
            databases: RefCell::new(HashMap::new()),
        });

        for dir in &collection.dirs {
            let pattern = dir.join("*.mst");
            let Ok(paths) = glob::glob(&pattern.to_string_lossy()) else {
                continue;
            };
            for path in paths.flatten() {
                match MasterFile::open(&path, &collection.config) {
                    Ok(mst) => {
                        debug!(db = %mst.name, "opened database");
                        collection
                            .databases
                            .borrow_mut()
                            .insert(mst.name.clone(), Rc::new(RefCell::new(mst)));
                    }
                    Err(err) => {
                        warn!(path = %path.display(), %err, "failed to open database");
                    }
                }
            }
        }
        Ok(collection)
    }

    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// A database by name, with or without the `.mst` extension, opening it
    /// from the collection directories or the configured search path when
    /// not yet loaded.
    pub fn database(&self, name: &str) -> Option<Rc<RefCell<MasterFile>>> {
        let name = name.strip_suffix(".mst").unwrap_or(name);
        if let Some(found) = self.databases.borrow().get(name) {
            return Some(found.clone());
        }

        let dirs = self.dirs.iter().chain(self.config.search_path.iter());
        for dir in dirs {
            let candidate = dir.join(format!("{name}.mst"));
            if !candidate.exists() {
                continue;
            }
            match MasterFile::open(&candidate, &self.config) {
                Ok(mst) => {
                    let handle = Rc::new(RefCell::new(mst));
                    self.databases
                        .borrow_mut()
                        .insert(name.to_owned(), handle.clone());
                    return Some(handle);
                }
                Err(err) => {
                    warn!(path = %candidate.display(), %err, "failed to open database");
                    return None;
                }
            }
        }
        None
    }

    /// An evaluation context over one of the collection's databases.
    pub fn context(self: &Rc<Self>, name: &str) -> Option<DatabaseContext> {
        let mst = self.database(name)?;
        Some(DatabaseContext::with_collection(mst, self.clone()))
    }
}

/// One open database as the formatting language sees it.
pub struct DatabaseContext {
    mst: Rc<RefCell<MasterFile>>,
    collection: Option<Rc<Collection>>,
    name: String,
    base_dir: PathBuf,
    config: Config,
    ref_cache: RefCell<HashMap<(String, u32), Option<Record>>>,
    indexes: RefCell<HashMap<String, Rc<dyn InvertedIndex>>>,
}

impl DatabaseContext {
    pub fn new(mst: Rc<RefCell<MasterFile>>) -> Self {
        let (name, base_dir, config) = {
            let mst = mst.borrow();
            (mst.name.clone(), mst.base_dir.clone(), mst.config.clone())
        };
        Self {
            mst,
            collection: None,
            name,
            base_dir,
            config,
            ref_cache: RefCell::new(HashMap::new()),
            indexes: RefCell::new(HashMap::new()),
        }
    }

    fn with_collection(mst: Rc<RefCell<MasterFile>>, collection: Rc<Collection>) -> Self {
        let mut ctx = Self::new(mst);
        ctx.collection = Some(collection);
        ctx
    }

    pub fn master(&self) -> &Rc<RefCell<MasterFile>> {
        &self.mst
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Attach an inverted index serving `l()`/`npost()` for this database
    /// (`None` name) or a named one.
    pub fn set_index(&self, db: Option<&str>, index: Rc<dyn InvertedIndex>) {
        let key = db.unwrap_or(&self.name).to_owned();
        self.indexes.borrow_mut().insert(key, index);
    }

    /// Resolve a cross-database name. `collection.database` spellings keep
    /// only the database part; the collection has one namespace.
    fn foreign(&self, db: &str) -> std::result::Result<Rc<RefCell<MasterFile>>, DatabaseError> {
        let db_name = db.rsplit('.').next().unwrap_or(db);
        if db_name == self.name {
            return Ok(self.mst.clone());
        }
        if let Some(collection) = &self.collection {
            if let Some(found) = collection.database(db_name) {
                return Ok(found);
            }
        }
        // fall back to the database's own directory and search path
        let dirs = std::iter::once(self.base_dir.clone())
            .chain(self.config.search_path.iter().cloned());
        for dir in dirs {
            let candidate = dir.join(format!("{db_name}.mst"));
            if candidate.exists() {
                return MasterFile::open(&candidate, &self.config)
                    .map(|mst| Rc::new(RefCell::new(mst)))
                    .map_err(|err| DatabaseError::Storage(err.to_string()));
            }
        }
        Err(DatabaseError::UnknownDatabase(db.to_owned()))
    }
}

impl Database for DatabaseContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn max_line_width(&self) -> usize {
        self.config.max_line_width
    }

    fn subfield_delimiter(&self) -> char {
        self.config.subfield_delimiter
    }

    fn record(
        &self,
        db: Option<&str>,
        mfn: u32,
    ) -> std::result::Result<Option<Record>, DatabaseError> {
        let key = (db.unwrap_or("").to_owned(), mfn);
        if let Some(cached) = self.ref_cache.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let handle = match db {
            None => self.mst.clone(),
            Some(name) => self.foreign(name)?,
        };
        let record = handle
            .borrow_mut()
            .get(mfn)
            .map_err(|err| DatabaseError::Storage(err.to_string()))?;
        self.ref_cache.borrow_mut().insert(key, record.clone());
        Ok(record)
    }

    fn first_posting_mfn(
        &self,
        db: Option<&str>,
        key: &str,
    ) -> std::result::Result<u32, DatabaseError> {
        let name = db.unwrap_or(&self.name);
        Ok(self
            .indexes
            .borrow()
            .get(name)
            .map(|index| index.first_mfn(&fold_key(key)))
            .unwrap_or(0))
    }

    fn posting_count(
        &self,
        db: Option<&str>,
        key: &str,
    ) -> std::result::Result<usize, DatabaseError> {
        let name = db.unwrap_or(&self.name);
        Ok(self
            .indexes
            .borrow()
            .get(name)
            .map(|index| index.count(&fold_key(key)))
            .unwrap_or(0))
    }

    fn gizmo(&self, name: &str) -> std::result::Result<Vec<(String, String)>, DatabaseError> {
        let handle = self.foreign(name)?;
        let mut handle = handle.borrow_mut();
        let mut pairs = Vec::new();
        for mfn in 1..handle.next_mfn() {
            let Ok(Some(record)) = handle.get(mfn) else {
                continue;
            };
            let (Some(from), Some(to)) = (record.get(1), record.get(2)) else {
                continue;
            };
            pairs.push((from.data(), to.data()));
        }
        Ok(pairs)
    }
}
