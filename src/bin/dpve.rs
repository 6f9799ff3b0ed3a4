// A decision-diagram-based propositional valuation engine
use {
    dpve::{
        cnf::Cnf,
        config::{Config, ResolvedConfig, VERSION},
        dpve::{report_kind, run, DpveOutcome},
        error::DpveError,
        jointree::{ingest::JoinTreeProcessor, JoinTree},
        types::MaximizerFormat,
        validator,
    },
    std::{
        borrow::Cow,
        fs::File,
        io::{stdin, BufReader, BufWriter, Write},
    },
    structopt::StructOpt,
};

const RED: &str = "\x1B[001m\x1B[031m";
const GREEN: &str = "\x1B[001m\x1B[032m";
const BLUE: &str = "\x1B[001m\x1B[034m";
const RESET: &str = "\x1B[000m";

fn colored(satisfiable: bool, quiet: bool) -> Cow<'static, str> {
    if quiet {
        Cow::Borrowed(if satisfiable { "s SATISFIABLE" } else { "s UNSATISFIABLE" })
    } else if satisfiable {
        Cow::from(format!("{}s SATISFIABLE{}", BLUE, RESET))
    } else {
        Cow::from(format!("{}s UNSATISFIABLE{}", GREEN, RESET))
    }
}

fn main() {
    env_logger::init();
    let config = Config::from_args();
    if !config.cnf_filename.exists() {
        eprintln!("{} does not exist.", config.cnf_filename.to_string_lossy());
        std::process::exit(1);
    }
    let resolved = match config.resolve() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}config error: {}{}", RED, e, RESET);
            std::process::exit(1);
        }
    };

    let result = solve(&resolved);
    std::process::exit(match result {
        Ok(outcome) => {
            save_result(&outcome, &resolved);
            if outcome.satisfiable {
                10
            } else {
                20
            }
        }
        Err(e) => {
            eprintln!("{}{}{}", RED, e, RESET);
            0
        }
    });
}

fn solve(config: &ResolvedConfig) -> Result<DpveOutcome, DpveError> {
    let cnf_file = File::open(&config.cnf_filename)?;
    let mut cnf = Cnf::new(config.random_seed, config.weighted_counting, config.projected_counting, config.multi_precision);
    match cnf.read(BufReader::new(cnf_file)) {
        Ok(()) => {}
        Err(DpveError::Unsat) => return Ok(DpveOutcome::unsat(config.log_counting, config.multi_precision)),
        Err(e) => return Err(e),
    }

    let tree: JoinTree = {
        let processor = JoinTreeProcessor::new(&cnf);
        processor.read(BufReader::new(stdin()), config.planner_wait)?
    };

    let outcome = run(&cnf, &tree, config)?;

    if config.verify_maximizer {
        if let Some(maximizer) = &outcome.maximizer {
            if !validator::validates(&cnf, maximizer) {
                return Err(DpveError::InvariantViolation(
                    "extracted maximizer does not satisfy the formula".into(),
                ));
            }
        }
    }

    Ok(outcome)
}

fn save_result(outcome: &DpveOutcome, config: &ResolvedConfig) {
    let mut ofile;
    let mut otty;
    let buf: &mut dyn Write = match &config.result_filename {
        Some(path) => match File::create(path) {
            Ok(f) => {
                ofile = BufWriter::new(f);
                &mut ofile
            }
            Err(_) => {
                otty = BufWriter::new(std::io::stdout());
                &mut otty
            }
        },
        None => {
            otty = BufWriter::new(std::io::stdout());
            &mut otty
        }
    };
    if let Err(why) = report(outcome, config, buf) {
        eprintln!("Abort: failed to save result by {}!", why);
    }
    println!("{}", colored(outcome.satisfiable, config.quiet_mode));
}

/// The six canonical report rows: satisfiability verdict, count/valuation
/// type, log10 estimate, exact/double value, and (if requested) one or two
/// maximizer rows.
fn report(outcome: &DpveOutcome, config: &ResolvedConfig, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "c dpve {} for {}", VERSION, config.cnf_filename.to_string_lossy())?;
    writeln!(out, "s {}", if outcome.satisfiable { "SATISFIABLE" } else { "UNSATISFIABLE" })?;
    writeln!(out, "c type {}", report_kind(config))?;
    writeln!(out, "c log10-estimate {}", outcome.value.log10())?;
    writeln!(out, "c value {}", outcome.value)?;
    if let Some(maximizer) = &outcome.maximizer {
        match config.maximizer_format {
            MaximizerFormat::Short | MaximizerFormat::Long | MaximizerFormat::Dual => {
                writeln!(out, "v {}", maximizer.to_dimacs_line())?;
            }
            MaximizerFormat::Neither => {}
        }
    }
    Ok(())
}
