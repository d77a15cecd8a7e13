//! Change sets for commits
//!
//! [`ChangeSetBuilder::build`] turns entry and asset edits into file-level
//! [`ChangeOp`]s with fully encoded bytes, plus a commit message. Entry
//! paths are computed with the same layouts used for classification.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use cms_content::{ParsedContent, encode};
use cms_git::ChangeOp;

use crate::config::{CommitMessages, SiteConfig};
use crate::layout::{LayoutCache, fill_template};
use crate::reconcile::{Entry, disassemble};
use crate::slug::new_entry_slug;
use crate::{Error, Result};

/// Kind of change a commit makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitKind {
    Create,
    Update,
    Delete,
    UploadMedia,
    DeleteMedia,
}

/// An edit to one logical entry
#[derive(Debug, Clone, Default)]
pub struct EntryEdit {
    pub collection: String,
    /// Listed file name, for file collections
    pub file_name: Option<String>,
    /// Target slug; new entries without one get a slug from the collection template
    pub slug: Option<String>,
    /// Edited content per locale
    pub locales: BTreeMap<String, ParsedContent>,
    /// The entry as last synced, for updates and deletes
    pub previous: Option<Entry>,
}

impl EntryEdit {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>, content: ParsedContent) -> Self {
        self.locales.insert(locale.into(), content);
        self
    }

    pub fn with_previous(mut self, previous: Entry) -> Self {
        self.previous = Some(previous);
        self
    }
}

/// An edit to one media file at its final repository path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEdit {
    pub path: String,
    pub data: Option<Vec<u8>>,
    pub previous_path: Option<String>,
    /// The file already exists and is overwritten
    pub replace: bool,
}

impl AssetEdit {
    pub fn upload(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: Some(data.into()),
            previous_path: None,
            replace: false,
        }
    }

    pub fn replace(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            replace: true,
            ..Self::upload(path, data)
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
            previous_path: None,
            replace: false,
        }
    }

    pub fn rename(previous_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
            previous_path: Some(previous_path.into()),
            replace: false,
        }
    }
}

/// Everything one commit should change
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub kind: CommitKind,
    pub entries: Vec<EntryEdit>,
    pub assets: Vec<AssetEdit>,
    /// Prefix the message with the skip-deploy marker
    pub skip_deploy: bool,
}

impl BuildRequest {
    pub fn new(kind: CommitKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            assets: Vec::new(),
            skip_deploy: false,
        }
    }

    pub fn entry(mut self, edit: EntryEdit) -> Self {
        self.entries.push(edit);
        self
    }

    pub fn asset(mut self, edit: AssetEdit) -> Self {
        self.assets.push(edit);
        self
    }

    pub fn skip_deploy(mut self, skip: bool) -> Self {
        self.skip_deploy = skip;
        self
    }
}

/// File operations and message for one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub changes: Vec<ChangeOp>,
    pub message: String,
}

/// Facts a commit message may mention; never file contents
#[derive(Debug, Clone, Default)]
pub struct MessageContext<'a> {
    pub collection: Option<&'a str>,
    pub slug: Option<&'a str>,
    pub path: Option<&'a str>,
    pub count: usize,
}

/// Render the commit message for `kind`
pub fn commit_message(
    templates: &CommitMessages,
    kind: CommitKind,
    context: &MessageContext,
) -> String {
    let many = context.count > 1;
    let template = match kind {
        CommitKind::Create => &templates.create,
        CommitKind::Update => &templates.update,
        CommitKind::Delete if many => &templates.delete_multiple,
        CommitKind::Delete => &templates.delete,
        CommitKind::UploadMedia if many => &templates.upload_multiple_media,
        CommitKind::UploadMedia => &templates.upload_media,
        CommitKind::DeleteMedia if many => &templates.delete_multiple_media,
        CommitKind::DeleteMedia => &templates.delete_media,
    };
    fill_template(template, |name| {
        Ok(match name {
            "collection" => context.collection.unwrap_or_default().to_string(),
            "slug" => context.slug.unwrap_or_default().to_string(),
            "path" => context.path.unwrap_or_default().to_string(),
            "count" => context.count.to_string(),
            other => format!("{{{{{other}}}}}"),
        })
    })
    .unwrap_or_else(|_| template.clone())
}

/// Builds change sets against a site configuration
pub struct ChangeSetBuilder<'a> {
    config: &'a SiteConfig,
    layouts: &'a LayoutCache,
}

impl<'a> ChangeSetBuilder<'a> {
    pub fn new(config: &'a SiteConfig, layouts: &'a LayoutCache) -> Self {
        Self { config, layouts }
    }

    pub fn build(&self, request: &BuildRequest) -> Result<ChangeSet> {
        let mut changes = Vec::new();
        let mut first_slug: Option<String> = None;

        for edit in &request.entries {
            let (slug, ops) = match request.kind {
                CommitKind::Delete => self.delete_entry(edit)?,
                CommitKind::Create | CommitKind::Update => self.save_entry(edit, request.kind)?,
                CommitKind::UploadMedia | CommitKind::DeleteMedia => {
                    return Err(Error::invalid_edit(
                        "media commits cannot carry entry edits",
                    ));
                }
            };
            first_slug.get_or_insert(slug);
            changes.extend(ops);
        }

        for asset in &request.assets {
            changes.push(asset_change(asset, request.kind)?);
        }

        if changes.is_empty() {
            return Err(Error::invalid_edit("nothing to commit"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = changes.iter().find(|c| !seen.insert(c.path.as_str())) {
            return Err(Error::invalid_edit(format!(
                "path '{}' is changed twice in one commit",
                dup.path
            )));
        }

        let count = match request.kind {
            CommitKind::UploadMedia | CommitKind::DeleteMedia => request.assets.len(),
            _ => request.entries.len(),
        };
        let context = MessageContext {
            collection: request.entries.first().map(|e| e.collection.as_str()),
            slug: first_slug.as_deref(),
            path: request.assets.first().map(|a| a.path.as_str()),
            count,
        };
        let mut message = commit_message(&self.config.commit_messages, request.kind, &context);
        let marker = &self.config.backend.skip_deploy_marker;
        if request.skip_deploy && !marker.is_empty() {
            message = format!("{marker} {message}");
        }

        tracing::debug!(changes = changes.len(), %message, "built change set");
        Ok(ChangeSet { changes, message })
    }

    fn save_entry(&self, edit: &EntryEdit, kind: CommitKind) -> Result<(String, Vec<ChangeOp>)> {
        let collection = self.config.collection(&edit.collection)?;
        let layouts = self.layouts.get_or_compile(self.config, collection)?;
        let file_name = edit
            .file_name
            .as_deref()
            .or_else(|| edit.previous.as_ref().and_then(|p| p.file_name.as_deref()));
        let layout = layouts.layout_for(file_name)?;

        if edit.locales.is_empty() {
            return Err(Error::invalid_edit(format!(
                "edit of collection '{}' has no content",
                edit.collection
            )));
        }

        let slug = match (&edit.slug, &edit.previous) {
            (Some(slug), _) => slug.clone(),
            (None, Some(previous)) => previous.slug.clone(),
            (None, None) => {
                let i18n = layout.i18n();
                let source = edit
                    .locales
                    .get(&i18n.default_locale)
                    .or_else(|| edit.locales.values().next())
                    .cloned()
                    .unwrap_or_default();
                new_entry_slug(&layout, &source, Utc::now())?
            }
        };

        let records = disassemble(&layout, &slug, &edit.locales, edit.previous.as_ref())?;
        let options = layout.encode_options()?;

        let mut ops = Vec::with_capacity(records.len());
        for record in records {
            let text = encode(&record.content, &options).map_err(|source| Error::Encode {
                path: record.path.clone(),
                source,
            })?;
            let previous_path = edit
                .previous
                .as_ref()
                .and_then(|p| p.locale(&record.locale))
                .map(|r| r.path.clone());

            let op = match previous_path {
                Some(previous) if previous != record.path => {
                    ChangeOp::moved(previous, record.path, Some(text.into_bytes()))
                }
                Some(_) => ChangeOp::update(record.path, text),
                // a locale missing from the synced entry is a new file
                None if kind == CommitKind::Create || edit.previous.is_some() => {
                    ChangeOp::create(record.path, text)
                }
                None => ChangeOp::update(record.path, text),
            };
            ops.push(op);
        }
        Ok((slug, ops))
    }

    fn delete_entry(&self, edit: &EntryEdit) -> Result<(String, Vec<ChangeOp>)> {
        let previous = edit.previous.as_ref().ok_or_else(|| {
            Error::invalid_edit(format!(
                "deleting from collection '{}' needs the synced entry",
                edit.collection
            ))
        })?;
        self.config.collection(&edit.collection)?;
        let ops = previous.paths().into_iter().map(ChangeOp::delete).collect();
        Ok((previous.slug.clone(), ops))
    }
}

fn asset_change(asset: &AssetEdit, kind: CommitKind) -> Result<ChangeOp> {
    if matches!(kind, CommitKind::Delete | CommitKind::DeleteMedia) {
        return Ok(ChangeOp::delete(&asset.path));
    }
    match (&asset.previous_path, &asset.data) {
        (Some(previous), data) => Ok(ChangeOp::moved(previous, &asset.path, data.clone())),
        (None, Some(data)) if asset.replace => Ok(ChangeOp::update(&asset.path, data.clone())),
        (None, Some(data)) => Ok(ChangeOp::create(&asset.path, data.clone())),
        (None, None) => Err(Error::invalid_edit(format!(
            "asset '{}' has no data",
            asset.path
        ))),
    }
}
