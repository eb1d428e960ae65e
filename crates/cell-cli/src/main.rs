use std::env;
use std::fs;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use cell_api::{CellController, SqliteRunStore};
use contracts::requests::OperationRequest;
use contracts::snapshot::CellSnapshot;
use contracts::Millis;

fn print_usage() {
    println!("cell-cli <command>");
    println!("commands:");
    println!("  plan <snapshot.json> <horizon-ms> [start-ms] [--out <file>] [--store <db> --run-id <id>]");
    println!("  request <snapshot.json> <request.json> [--out <file>]");
    println!("  inspect <snapshot.json>");
    println!("  show-run <db> <run-id>");
}

fn load_snapshot(path: &str) -> Result<CellSnapshot, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("cannot read {path}: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid snapshot {path}: {err}"))
}

fn parse_millis(value: Option<&String>, label: &str) -> Result<Millis, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<Millis>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
}

fn wall_clock_ms() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Millis)
        .unwrap_or(0)
}

fn write_output(path: Option<&String>, payload: &str) -> Result<(), String> {
    match path {
        Some(path) => {
            fs::write(path, payload).map_err(|err| format!("cannot write {path}: {err}"))
        }
        None => {
            println!("{payload}");
            Ok(())
        }
    }
}

fn cmd_plan(args: &[String]) -> Result<(), String> {
    let snapshot = load_snapshot(args.first().ok_or("missing snapshot path")?)?;
    let horizon = parse_millis(args.get(1), "horizon-ms")?;
    let start = match args.get(2).filter(|raw| !raw.starts_with("--")) {
        Some(raw) => raw
            .parse::<Millis>()
            .map_err(|_| format!("invalid start-ms: {raw}"))?,
        None => wall_clock_ms(),
    };

    let mut controller = CellController::from_snapshot(snapshot);
    let events = match flag_value(args, "--store") {
        Some(db_path) => {
            let run_id = flag_value(args, "--run-id").ok_or("missing --run-id")?;
            let mut store =
                SqliteRunStore::open(db_path).map_err(|err| format!("store: {err}"))?;
            controller
                .plan_persisted(run_id, start, horizon, &mut store)
                .map_err(|err| format!("plan failed: {err}"))?
        }
        None => controller
            .plan(start, horizon)
            .map_err(|err| format!("plan failed: {err}"))?,
    };

    eprintln!("planned {} actions over {horizon} ms", events.len());
    let payload = serde_json::to_string_pretty(controller.snapshot())
        .map_err(|err| format!("encode: {err}"))?;
    write_output(flag_value(args, "--out"), &payload)
}

fn cmd_request(args: &[String]) -> Result<(), String> {
    let snapshot = load_snapshot(args.first().ok_or("missing snapshot path")?)?;
    let request_path = args.get(1).ok_or("missing request path")?;
    let raw = fs::read_to_string(request_path)
        .map_err(|err| format!("cannot read {request_path}: {err}"))?;
    let request: OperationRequest =
        serde_json::from_str(&raw).map_err(|err| format!("invalid request: {err}"))?;

    let mut controller = CellController::from_snapshot(snapshot);
    let outcome = controller
        .apply(&request, wall_clock_ms())
        .map_err(|err| format!("request failed: {err}"))?;
    eprintln!(
        "applied; {} transactions, {} objects created",
        outcome.transactions.len(),
        outcome.created_ids.len()
    );

    let payload = serde_json::to_string_pretty(controller.snapshot())
        .map_err(|err| format!("encode: {err}"))?;
    write_output(flag_value(args, "--out"), &payload)
}

fn cmd_inspect(args: &[String]) -> Result<(), String> {
    let snapshot = load_snapshot(args.first().ok_or("missing snapshot path")?)?;
    println!(
        "persons={} npcs={} resources={} objects={} stockpiles={} houses={}",
        snapshot.persons.len(),
        snapshot.npcs.len(),
        snapshot.resources.len(),
        snapshot.objects.len(),
        snapshot.stockpiles.len(),
        snapshot.houses.len(),
    );
    for npc in snapshot.npcs.values() {
        println!(
            "  npc {} at ({}, {}): {} slots, {} pending deltas, {} path points",
            npc.id,
            npc.x,
            npc.y,
            npc.inventory.slots.len(),
            npc.inventory_state.len(),
            npc.path.len(),
        );
    }
    Ok(())
}

fn cmd_show_run(args: &[String]) -> Result<(), String> {
    let db_path = args.first().ok_or("missing db path")?;
    let run_id = args.get(1).ok_or("missing run id")?;
    let store = SqliteRunStore::open(db_path).map_err(|err| format!("store: {err}"))?;
    let Some(run) = store
        .load_run(run_id)
        .map_err(|err| format!("store: {err}"))?
    else {
        return Err(format!("no such run: {run_id}"));
    };
    println!(
        "run {} started {} horizon {} ms, {} actions",
        run.run_id,
        run.started_at,
        run.horizon_ms,
        run.events.len()
    );
    for event in &run.events {
        let line = serde_json::to_string(event).map_err(|err| format!("encode: {err}"))?;
        println!("  {line}");
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);
    let rest: &[String] = args.get(2..).unwrap_or(&[]);

    let result = match command {
        Some("plan") => cmd_plan(rest),
        Some("request") => cmd_request(rest),
        Some("inspect") => cmd_inspect(rest),
        Some("show-run") => cmd_show_run(rest),
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        print_usage();
        process::exit(2);
    }
}
