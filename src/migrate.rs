use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::MigrateArgs, load_settings, serialize::TableSpecSerializer, types::csv_registry,
};

pub fn execute(args: &MigrateArgs) -> Result<()> {
    let loaded = load_settings(&args.settings, &args.legacy)?;
    let registry = csv_registry();
    let tree = TableSpecSerializer::new(&registry).save(&loaded.config)?;
    let destination = args.output.as_ref().unwrap_or(&args.settings);
    tree.save(destination)
        .with_context(|| format!("Writing settings to {destination:?}"))?;
    info!(
        "Migrated {:?} from {} to the current layout at {destination:?}",
        args.settings, loaded.version
    );
    Ok(())
}
