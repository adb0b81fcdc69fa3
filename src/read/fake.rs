//! Scripted engine used by the reader's unit tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::PoisonError;

use crate::attributes;
use crate::engine::{
    AskMode, Engine, EngineArchive, ExtractMode, OpenRequest, OperationResult, PropValue,
    PropertyId, SharedSink,
};
use crate::format::ArchiveFormat;
use crate::password::Password;
use crate::source::SharedStream;
use crate::string::LongPathPolicy;
use crate::{Error, Result};

const E_INVALIDARG: u32 = 0x8007_0057;

#[derive(Debug, Clone)]
pub(crate) struct FakeItem {
    properties: BTreeMap<PropertyId, PropValue>,
    data: Vec<u8>,
    password: Option<String>,
    result: OperationResult,
}

impl FakeItem {
    pub fn file(path: &str, data: &[u8]) -> Self {
        Self::unnamed(data)
            .with(PropertyId::Path, PropValue::String(path.to_string()))
            .with(PropertyId::Attrib, PropValue::U32(attributes::ARCHIVE))
    }

    pub fn dir(path: &str) -> Self {
        let mut item = Self::unnamed(b"");
        item.properties.clear();
        item.with(PropertyId::Path, PropValue::String(path.to_string()))
            .with(PropertyId::IsDir, PropValue::Bool(true))
            .with(PropertyId::Attrib, PropValue::U32(attributes::DIRECTORY))
    }

    pub fn unnamed(data: &[u8]) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(PropertyId::IsDir, PropValue::Bool(false));
        properties.insert(PropertyId::Size, PropValue::U64(data.len() as u64));
        properties.insert(PropertyId::PackSize, PropValue::U64(data.len() as u64 / 2));
        properties.insert(PropertyId::Crc, PropValue::U32(crc32fast::hash(data)));
        Self {
            properties,
            data: data.to_vec(),
            password: None,
            result: OperationResult::Ok,
        }
    }

    pub fn with(mut self, property: PropertyId, value: PropValue) -> Self {
        self.properties.insert(property, value);
        self
    }

    pub fn without(mut self, property: PropertyId) -> Self {
        self.properties.remove(&property);
        self
    }

    pub fn encrypted(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self.with(PropertyId::Encrypted, PropValue::Bool(true))
    }

    pub fn failing(mut self, result: OperationResult) -> Self {
        self.result = result;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeArchive {
    items: Vec<FakeItem>,
    properties: BTreeMap<PropertyId, PropValue>,
    volumes: u32,
}

impl FakeArchive {
    pub fn new(items: Vec<FakeItem>) -> Self {
        Self {
            items,
            properties: BTreeMap::new(),
            volumes: 1,
        }
    }

    pub fn with_property(mut self, property: PropertyId, value: PropValue) -> Self {
        self.properties.insert(property, value);
        self
    }

    pub fn with_volumes(mut self, volumes: u32) -> Self {
        self.volumes = volumes;
        self
    }

    fn item(&self, index: u32) -> Result<&FakeItem> {
        self.items.get(index as usize).ok_or(Error::Engine {
            hresult: E_INVALIDARG,
            context: "get item property",
        })
    }
}

impl EngineArchive for FakeArchive {
    fn item_count(&self) -> Result<u32> {
        Ok(self.items.len() as u32)
    }

    fn item_property(&self, index: u32, property: PropertyId) -> Result<PropValue> {
        Ok(self
            .item(index)?
            .properties
            .get(&property)
            .cloned()
            .unwrap_or_default())
    }

    fn archive_property(&self, property: PropertyId) -> Result<PropValue> {
        Ok(self.properties.get(&property).cloned().unwrap_or_default())
    }

    fn archive_property_ids(&self) -> Result<Vec<PropertyId>> {
        Ok(self.properties.keys().copied().collect())
    }

    fn opened_volumes(&self) -> u32 {
        self.volumes
    }

    fn extract(
        &self,
        indices: Option<&[u32]>,
        mode: ExtractMode,
        sink: SharedSink,
        password: Option<&Password>,
    ) -> Result<()> {
        let indices: Vec<u32> = match indices {
            Some(list) => list.to_vec(),
            None => (0..self.items.len() as u32).collect(),
        };
        let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
        let total = indices
            .iter()
            .filter_map(|&i| self.items.get(i as usize))
            .map(|item| item.data.len() as u64)
            .sum();
        sink.total(total);

        let ask = match mode {
            ExtractMode::Extract => AskMode::Extract,
            ExtractMode::Test => AskMode::Test,
        };
        let mut done = 0u64;
        for index in indices {
            let item = self.item(index)?;
            let wanted = sink.begin(index, ask)?;

            let result = match (&item.password, password) {
                (Some(_), None) => return Err(Error::PasswordRequired),
                (Some(expected), Some(given)) if expected != given.as_str() => {
                    OperationResult::DataError
                }
                _ => item.result,
            };
            if wanted && mode == ExtractMode::Extract && result.is_ok() {
                for chunk in item.data.chunks(3) {
                    sink.write(index, chunk)?;
                }
            }
            done += item.data.len() as u64;
            sink.completed(done);
            sink.finish(index, result)?;
        }
        Ok(())
    }
}

/// An engine that accepts a fixed set of formats.
#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    accepts: Vec<(ArchiveFormat, FakeArchive)>,
    unsupported: Vec<ArchiveFormat>,
    header_password: Option<String>,
    pub attempts: RefCell<Vec<ArchiveFormat>>,
    pub path_policies: RefCell<Vec<LongPathPolicy>>,
}

impl FakeEngine {
    pub fn accepting(format: ArchiveFormat, archive: FakeArchive) -> Self {
        Self {
            accepts: vec![(format, archive)],
            ..Self::default()
        }
    }

    pub fn also_accepting(mut self, format: ArchiveFormat, archive: FakeArchive) -> Self {
        self.accepts.push((format, archive));
        self
    }

    pub fn without_handler(mut self, format: ArchiveFormat) -> Self {
        self.unsupported.push(format);
        self
    }

    pub fn with_header_password(mut self, password: &str) -> Self {
        self.header_password = Some(password.to_string());
        self
    }
}

impl Engine for FakeEngine {
    fn open_archive<'a>(
        &'a self,
        format: ArchiveFormat,
        _stream: SharedStream,
        request: &OpenRequest<'_>,
    ) -> Result<Box<dyn EngineArchive + 'a>> {
        self.attempts.borrow_mut().push(format);
        self.path_policies.borrow_mut().push(request.long_path_policy);
        if self.unsupported.contains(&format) {
            return Err(Error::UnsupportedFormat { format });
        }
        let archive = self
            .accepts
            .iter()
            .find(|(accepted, _)| *accepted == format)
            .map(|(_, archive)| archive.clone())
            .ok_or(Error::FormatMismatch { format })?;

        if let Some(expected) = &self.header_password {
            match request.password {
                None => return Err(Error::PasswordRequired),
                Some(given) if given.as_str() != expected => {
                    return Err(Error::WrongPassword { index: None });
                }
                Some(_) => {}
            }
        }
        Ok(Box::new(archive))
    }
}
