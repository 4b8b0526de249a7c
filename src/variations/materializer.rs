use anyhow::Result;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database_ops::repository::RelationalRepository;
use crate::normalization::color::ColorEncoding;
use crate::variations::model::{ProductRow, SourceRecord};

pub const DEFAULT_COLOR_OPTION: &str = "Cor";

/// What a color attachment wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorLink {
    pub option_created: bool,
    pub option_value_created: bool,
    pub linked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeOutcome {
    pub variant_id: Uuid,
    pub variant_created: bool,
    pub color: Option<String>,
    pub color_link: ColorLink,
}

/// Writes one variant relationship. Each step is idempotent, so replaying a
/// variant converges instead of duplicating rows.
pub struct VariantMaterializer<'a> {
    relational: &'a dyn RelationalRepository,
    option_name: String,
    option_id: Option<Uuid>,
}

impl<'a> VariantMaterializer<'a> {
    pub fn new(relational: &'a dyn RelationalRepository, option_name: impl Into<String>) -> Self {
        Self {
            relational,
            option_name: option_name.into(),
            option_id: None,
        }
    }

    /// The color option id, resolved once per materializer.
    async fn color_option(&mut self) -> Result<(Uuid, bool)> {
        if let Some(id) = self.option_id {
            return Ok((id, false));
        }
        let option = self.relational.ensure_option(&self.option_name).await?;
        if option.created {
            info!(option = %self.option_name, option_id = %option.id, "color option created");
        }
        self.option_id = Some(option.id);
        Ok((option.id, option.created))
    }

    /// Get-or-create the option value for `label` and link it to the variant.
    pub async fn attach_color(&mut self, variant_id: Uuid, label: &str) -> Result<ColorLink> {
        let (option_id, option_created) = self.color_option().await?;
        let value = self.relational.ensure_option_value(option_id, label).await?;
        let linked = self
            .relational
            .link_option_value(variant_id, option_id, value.id)
            .await?;
        Ok(ColorLink {
            option_created,
            option_value_created: value.created,
            linked,
        })
    }

    pub async fn materialize(
        &mut self,
        canonical: &ProductRow,
        variant: &ProductRow,
        source: &SourceRecord,
    ) -> Result<MaterializeOutcome> {
        let price = source.price.unwrap_or(0.0);
        let upserted = self.relational.upsert_variant(canonical, variant, price).await?;

        let color = ColorEncoding::parse(source.color_encoding.as_deref());
        if let ColorEncoding::Malformed(raw) = &color {
            debug!(sku = %variant.sku, raw = %raw, "unparseable color; skipping color step");
        }
        let color_link = match color.label() {
            Some(label) => self.attach_color(upserted.id, label).await?,
            None => ColorLink::default(),
        };

        self.relational.mark_as_variant(variant.id).await?;

        debug!(
            canonical = %canonical.sku,
            sku = %variant.sku,
            variant_id = %upserted.id,
            created = upserted.created,
            color = color.label().unwrap_or("-"),
            hexcode = color.hexcode().unwrap_or("-"),
            "variant materialized"
        );
        Ok(MaterializeOutcome {
            variant_id: upserted.id,
            variant_created: upserted.created,
            color: color.label().map(str::to_string),
            color_link,
        })
    }
}
