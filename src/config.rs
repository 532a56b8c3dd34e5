//! The persisted unit: source specs, configuration identity and transformation.

use crate::{
    config_id::ConfigId,
    error::SpecError,
    path::ConversionPathRegistry,
    spec::{ExternalType, RawSpec, SourceSpecs},
    transformation::{OutputColumn, TableTransformation},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpecConfig<T> {
    source_group_id: String,
    config_id: ConfigId,
    individual_specs: SourceSpecs<T>,
    transformation: TableTransformation<T>,
}

impl<T: ExternalType> TableSpecConfig<T> {
    /// Bundles the parts, checking that the transformation was built for the
    /// raw spec these individual specs produce.
    pub fn new(
        source_group_id: impl Into<String>,
        config_id: ConfigId,
        individual_specs: SourceSpecs<T>,
        transformation: TableTransformation<T>,
    ) -> Result<Self, SpecError> {
        transformation.validate()?;
        let raw_spec = RawSpec::from_sources(&individual_specs);
        if raw_spec != transformation.raw_spec {
            return Err(SpecError::InvalidTransformation(
                "transformation was not built for the given individual specs".to_string(),
            ));
        }
        Ok(TableSpecConfig {
            source_group_id: source_group_id.into(),
            config_id,
            individual_specs,
            transformation,
        })
    }

    pub fn source_group_id(&self) -> &str {
        &self.source_group_id
    }

    pub fn config_id(&self) -> &ConfigId {
        &self.config_id
    }

    pub fn individual_specs(&self) -> &SourceSpecs<T> {
        &self.individual_specs
    }

    pub fn transformation(&self) -> &TableTransformation<T> {
        &self.transformation
    }

    pub fn into_transformation(self) -> TableTransformation<T> {
        self.transformation
    }

    pub fn raw_spec(&self) -> &RawSpec<T> {
        &self.transformation.raw_spec
    }

    /// Whether this config was produced by a configuration equivalent to `id`.
    pub fn is_config_for(&self, id: &ConfigId) -> bool {
        self.config_id.is_compatible(id)
    }

    pub fn output_spec(&self) -> Vec<OutputColumn<T>> {
        self.transformation.output_columns()
    }

    /// Output columns a single source contributes to. Columns the source
    /// lacks are left out. Unless types are enforced, the source's own
    /// column spec is reported, and a source type that differs from the
    /// union's is read through the registry's default path for that type.
    pub fn output_spec_for<R>(
        &self,
        item: &str,
        registry: &R,
    ) -> Result<Vec<OutputColumn<T>>, SpecError>
    where
        R: ConversionPathRegistry<T> + ?Sized,
    {
        let spec = self
            .individual_specs
            .get(item)
            .ok_or_else(|| SpecError::UnknownSource(item.to_string()))?;
        let enforce_types = self.transformation.enforce_types;
        Ok(self
            .output_spec()
            .into_iter()
            .filter_map(|mut column| {
                let own = spec.columns.iter().find(|own| own.name == column.source.name)?;
                if !enforce_types {
                    if own.column_type != column.source.column_type {
                        column.conversion_path = registry.default_path(&own.column_type);
                    }
                    column.source = own.clone();
                }
                Some(column)
            })
            .collect())
    }
}
