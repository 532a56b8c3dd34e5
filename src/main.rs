fn main() {
    if let Err(err) = csv_table_spec::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
