// Independent checker for a dpve-reported maximizer or model
#![allow(unused_imports)]
use {
    dpve::{
        cnf::Cnf,
        types::Assignment,
        validator::ValidatorIF,
    },
    std::{
        fs::File,
        io::{stdin, BufRead, BufReader},
        path::{Path, PathBuf},
    },
    structopt::StructOpt,
};

const RED: &str = "\x1B[001m\x1B[031m";
const GREEN: &str = "\x1B[001m\x1B[032m";
const BLUE: &str = "\x1B[001m\x1B[034m";
const RESET: &str = "\x1B[000m";

#[derive(StructOpt)]
#[structopt(name = "dpve_verify", about = "Independent checker for a dpve-reported maximizer or model")]
struct TargetOpts {
    #[structopt(parse(from_os_str))]
    #[structopt(short = "a", long = "assign")]
    /// a result file generated by dpve
    assign: Option<PathBuf>,
    #[structopt(parse(from_os_str))]
    /// a CNF file
    problem: PathBuf,
    #[structopt(long = "without-color", short = "C")]
    /// disable colorized output
    without_color: bool,
}

fn main() {
    let mut args = TargetOpts::from_args();
    if !args.problem.exists() {
        println!("{} does not exist.", args.problem.to_str().unwrap());
        return;
    }
    let (red, green, blue) = if args.without_color { (RESET, RESET, RESET) } else { (RED, GREEN, BLUE) };

    let cnf_file = match File::open(&args.problem) {
        Ok(f) => f,
        Err(e) => {
            println!("failed to open {}: {}", args.problem.to_str().unwrap(), e);
            return;
        }
    };
    let mut cnf = Cnf::new(0, false, false, true);
    if let Err(e) = cnf.read(BufReader::new(cnf_file)) {
        println!("failed to parse {}: {}", args.problem.to_str().unwrap(), e);
        return;
    }

    if args.assign.is_none() {
        args.assign = Some(PathBuf::from(format!(
            ".ans_{}",
            Path::new(&args.problem).file_name().unwrap().to_string_lossy()
        )));
    }

    let (literals, from_file) = match &args.assign {
        Some(f) if f.exists() => {
            let mut reader = BufReader::new(File::open(f).unwrap());
            match read_assignment(&mut reader, &args.problem.to_string_lossy()) {
                Some(v) => (v, true),
                None => return,
            }
        }
        _ => {
            let mut reader = BufReader::new(stdin());
            match read_assignment(&mut reader, &args.problem.to_string_lossy()) {
                Some(v) => (v, false),
                None => return,
            }
        }
    };

    let mut assignment = Assignment::new(cnf.declared_var_count);
    for lit in &literals {
        let var = lit.unsigned_abs() as usize;
        assignment.set(var, *lit > 0);
    }

    match cnf.validate(&assignment) {
        Some(violated) => println!(
            "{}An invalid assignment set for {}{} violates clause {:?}.",
            red,
            args.problem.to_str().unwrap(),
            RESET,
            violated,
        ),
        None if from_file => println!(
            "{}A valid assignment set for {}{} is found in {}",
            green,
            args.problem.to_str().unwrap(),
            RESET,
            args.assign.unwrap().to_str().unwrap(),
        ),
        None => println!("{}A valid assignment set for {}.{}", green, args.problem.to_str().unwrap(), RESET),
    }
}

/// Reads a dpve/DIMACS-style result stream: `c` lines are comments, `s`
/// announces satisfiability (bailing out on `UNSATISFIABLE`), `v` or a bare
/// literal line carries the assignment itself, terminated by `0`.
fn read_assignment(rs: &mut dyn BufRead, cnf_name: &str) -> Option<Vec<i64>> {
    let mut buf = String::new();
    loop {
        buf.clear();
        match rs.read_line(&mut buf) {
            Ok(0) => return Some(Vec::new()),
            Ok(_) => {
                let line = buf.trim();
                if line.starts_with('c') {
                    continue;
                }
                if line.starts_with("s SATISFIABLE") {
                    continue;
                }
                if line.starts_with("s UNSATISFIABLE") {
                    println!("{} is reported unsatisfiable; nothing to verify.", cnf_name);
                    return None;
                }
                let line = line.strip_prefix('v').unwrap_or(line);
                let mut v = Vec::new();
                for tok in line.split_whitespace() {
                    match tok.parse::<i64>() {
                        Ok(0) => return Some(v),
                        Ok(x) => v.push(x),
                        Err(_) => continue,
                    }
                }
                if !v.is_empty() {
                    return Some(v);
                }
            }
            Err(e) => {
                println!("failed to read assignment: {}", e);
                return None;
            }
        }
    }
}
