use anyhow::Result;

use crate::{cli::ShowArgs, load_settings, table, types::csv_registry};

pub fn execute(args: &ShowArgs) -> Result<()> {
    let loaded = load_settings(&args.settings, &args.legacy)?;
    let config = &loaded.config;
    let transformation = config.transformation();

    println!("source group: {}", config.source_group_id());
    println!("format: {}", loaded.version);
    println!("config: {}", config.config_id().fingerprint());
    println!("merge mode: {}", transformation.merge_mode);
    println!(
        "enforce types: {}, skip empty columns: {}",
        transformation.enforce_types, transformation.skip_empty_columns
    );
    println!("sources: {}", config.individual_specs().items().join(", "));
    println!();

    if let Some(source) = &args.source {
        let columns = config.output_spec_for(source, &csv_registry())?;
        print!("{}", table::output_table(&columns));
    } else if args.output_spec {
        print!("{}", table::output_table(&config.output_spec()));
    } else {
        print!("{}", table::transformation_table(transformation, &[]));
    }
    Ok(())
}
