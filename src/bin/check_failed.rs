use anyhow::Context;
use clap::Parser;
use geocode_addresses::core::pipeline::parse_csv;

#[derive(Debug, Parser)]
#[command(name = "check_failed")]
#[command(about = "List records that did not resolve to coordinates")]
struct Args {
    #[arg(long, default_value = "data/processed/geocoded_licenses.csv")]
    input: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data = std::fs::read(&args.input).with_context(|| format!("reading {}", args.input))?;
    let batch = parse_csv(&data)?;

    let status_idx = batch
        .column_index("geocode_status")
        .context("input has no geocode_status column; run geocode-addresses first")?;
    let address_idx = batch.column_index("address");
    let name_idx = batch.column_index("business_name");

    println!("\n=== FAILED ADDRESSES ===\n");
    let mut failed = 0usize;
    for (i, row) in batch.rows.iter().enumerate() {
        if row[status_idx] == "success" {
            continue;
        }
        failed += 1;
        match name_idx {
            Some(idx) => println!("{}. {}", i + 1, row[idx]),
            None => println!("{}.", i + 1),
        }
        if let Some(idx) = address_idx {
            println!("   Address: {}", row[idx]);
        }
        println!("   Status: {}\n", row[status_idx]);
    }

    println!("{} failed out of {} records", failed, batch.len());
    Ok(())
}
