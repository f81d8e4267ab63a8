use std::str::FromStr;

use serde::Serialize;
use tera::Tera;

use crate::error::Error;
use crate::graph::OperationUsage;
use crate::tools;

/// Disambiguates which usage fills the single-value template slots when
/// a schema is referenced from more than one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimaryOperationPolicy {
    #[default]
    FirstEncountered,
    Alphabetical,
    MostSpecific,
}

impl FromStr for PrimaryOperationPolicy {
    type Err = Error;

    fn from_str(input: &str) -> Result<PrimaryOperationPolicy, Self::Err> {
        match input {
            "first-encountered" => Ok(PrimaryOperationPolicy::FirstEncountered),
            "alphabetical" => Ok(PrimaryOperationPolicy::Alphabetical),
            "most-specific" => Ok(PrimaryOperationPolicy::MostSpecific),
            _ => Err(Error::UnknownPrimaryOperationPolicy(input.to_string())),
        }
    }
}

/// Variables exposed to the rename template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenameContext {
    pub name: String,
    pub source: String,
    pub index: usize,

    pub path: String,
    pub method: String,
    pub operation_id: String,
    pub tags: Vec<String>,
    pub usage: String,
    pub status_code: String,
    pub media_type: String,
    pub param_name: String,

    pub all_paths: Vec<String>,
    pub all_methods: Vec<String>,
    pub all_operation_ids: Vec<String>,
    pub all_tags: Vec<String>,
    pub ref_count: usize,
    pub is_shared: bool,
    pub primary_resource: String,
}

impl RenameContext {
    pub fn new(name: &str, source_path: &str, index: usize) -> RenameContext {
        RenameContext {
            name: name.to_string(),
            source: tools::sanitize_source(source_path),
            index,
            ..RenameContext::default()
        }
    }

    pub fn with_usages(
        mut self,
        usages: &[OperationUsage],
        ref_count: usize,
        policy: PrimaryOperationPolicy,
    ) -> RenameContext {
        if let Some(primary) = select_primary(usages, policy) {
            self.path = primary.path.clone();
            self.method = primary.method.clone();
            self.operation_id = primary.operation_id.clone();
            self.tags = primary.tags.clone();
            self.usage = primary.usage.to_string();
            self.status_code = primary.status_code.clone();
            self.media_type = primary.media_type.clone();
            self.param_name = primary.param_name.clone();
            self.primary_resource = primary
                .path
                .split('/')
                .find(|s| !s.is_empty() && !(s.starts_with('{') && s.ends_with('}')))
                .unwrap_or_default()
                .to_string();
        }

        self.all_paths = sorted_unique(usages.iter().map(|u| u.path.clone()));
        self.all_methods = sorted_unique(usages.iter().map(|u| u.method.clone()));
        self.all_operation_ids = sorted_unique(usages.iter().map(|u| u.operation_id.clone()));
        self.all_tags = sorted_unique(usages.iter().flat_map(|u| u.tags.clone()));
        self.ref_count = ref_count;
        self.is_shared = ref_count > 1;

        self
    }
}

fn sorted_unique(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = values.filter(|v| !v.is_empty()).collect();
    out.sort();
    out.dedup();

    out
}

fn select_primary(
    usages: &[OperationUsage],
    policy: PrimaryOperationPolicy,
) -> Option<&OperationUsage> {
    match policy {
        PrimaryOperationPolicy::FirstEncountered => usages.first(),
        PrimaryOperationPolicy::Alphabetical => usages
            .iter()
            .min_by_key(|u| format!("{}{}", u.path, u.method)),
        PrimaryOperationPolicy::MostSpecific => usages
            .iter()
            .find(|u| !u.operation_id.is_empty())
            .or_else(|| usages.iter().find(|u| !u.tags.is_empty()))
            .or_else(|| usages.first()),
    }
}

const TEMPLATE_NAME: &str = "rename";

pub const DEFAULT_TEMPLATE: &str = "{{ name }}_{{ source }}";

/// Renders generated schema names from the configured template,
/// falling back to `Name_Source` when the template cannot be parsed
/// or rendered.
pub struct NameGenerator {
    tera: Option<Tera>,
}

impl NameGenerator {
    pub fn new(template: &str) -> NameGenerator {
        let mut tera = Tera::default();
        super::filters::register(&mut tera);

        let tera = match tera.add_raw_template(TEMPLATE_NAME, template) {
            Ok(()) => Some(tera),
            Err(err) => {
                log::warn!("cannot parse rename template, falling back: {err:?}");
                None
            }
        };

        NameGenerator { tera }
    }

    pub fn generate(&self, context: &RenameContext) -> String {
        let rendered = self.tera.as_ref().and_then(|tera| {
            let ctx = tera::Context::from_serialize(context).ok()?;

            match tera.render(TEMPLATE_NAME, &ctx) {
                Ok(name) if !name.trim().is_empty() => Some(name.trim().to_string()),
                Ok(_) => None,
                Err(err) => {
                    log::warn!("cannot render rename template, falling back: {err:?}");
                    None
                }
            }
        });

        rendered.unwrap_or_else(|| format!("{}_{}", context.name, context.source))
    }
}
