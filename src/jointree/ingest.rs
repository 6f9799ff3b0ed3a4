//! Component E: reads the external planner's join-tree stream from stdin,
//! under a wall-clock timeout, keeping the narrowest candidate tree seen.
//!
//! The original arms a `SIGALRM` and kills the planner from the signal
//! handler. Rust has no portable async-signal-safe story for that without
//! `unsafe` well beyond what a line reader needs, so this port moves the
//! timeout off-thread: a dedicated reader thread streams lines over an
//! `mpsc` channel while the main thread blocks on `recv_timeout`, exactly
//! bounding the same wall-clock budget. The planner process is still killed
//! via `libc::kill`, matching the original's `SIGKILL`.
use crate::cnf::Cnf;
use crate::error::{DpveError, DpveResult};
use crate::jointree::JoinTree;
use std::io::BufRead;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const JOIN_TREE_WORD: &str = "jt";
const ELIM_VARS_WORD: &str = "e";

/// One line of planner output, tagged by the thread that read it so the
/// timeout can distinguish "still waiting" from "reader hung up".
enum Line {
    Text(String),
    Eof,
}

fn spawn_reader<R: BufRead + Send + 'static>(mut reader: R) -> mpsc::Receiver<Line> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = String::new();
        loop {
            buf.clear();
            match reader.read_line(&mut buf) {
                Ok(0) | Err(_) => {
                    let _ = tx.send(Line::Eof);
                    return;
                }
                Ok(_) => {
                    let line = buf.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(Line::Text(line)).is_err() {
                        return;
                    }
                }
            }
        }
    });
    rx
}

fn kill_planner(pid: Option<i32>) {
    match pid {
        None => log::warn!("found no pid for planner process"),
        Some(pid) => unsafe {
            if libc::kill(pid, libc::SIGKILL) == 0 {
                log::info!("killed planner process with pid {}", pid);
            }
        },
    }
}

fn split_words(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// State threaded through one in-progress join tree as its lines arrive.
struct InProgress {
    tree: JoinTree,
    problem_seen: bool,
}

/// Drives the stdin protocol to completion and returns the narrowest join
/// tree seen before the timeout (or before stdin closed, if sooner).
pub struct JoinTreeProcessor<'a> {
    cnf: &'a Cnf,
}

impl<'a> JoinTreeProcessor<'a> {
    pub fn new(cnf: &'a Cnf) -> Self {
        JoinTreeProcessor { cnf }
    }

    /// Reads join trees from `reader` for up to `planner_wait_duration`,
    /// returning the narrowest complete tree received. `planner_wait_duration
    /// == 0` disarms the timeout entirely (wait until stdin closes).
    pub fn read(&self, reader: impl BufRead + Send + 'static, planner_wait_duration: Duration) -> DpveResult<JoinTree> {
        let rx = spawn_reader(reader);
        let deadline = if planner_wait_duration.is_zero() {
            None
        } else {
            Some(Instant::now() + planner_wait_duration)
        };

        let mut planner_pid: Option<i32> = None;
        let mut current: Option<InProgress> = None;
        let mut best: Option<JoinTree> = None;
        let mut line_index: usize = 0;

        'outer: loop {
            let line = match deadline {
                None => match rx.recv() {
                    Ok(l) => l,
                    Err(_) => Line::Eof,
                },
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(remaining) {
                        Ok(l) => l,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            log::info!("planner timeout reached");
                            if best.is_none() && current.is_none() {
                                log::info!("found no join tree yet; will wait for first join tree then kill planner");
                                match rx.recv() {
                                    Ok(l) => l,
                                    Err(_) => Line::Eof,
                                }
                            } else {
                                kill_planner(planner_pid);
                                break 'outer;
                            }
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => Line::Eof,
                    }
                }
            };

            let text = match line {
                Line::Eof => break 'outer,
                Line::Text(t) => t,
            };
            line_index += 1;
            let words = split_words(&text);

            if words.is_empty() {
                continue;
            }
            match words[0] {
                "=" => {
                    if let Some(in_progress) = current.take() {
                        finalize(in_progress, &mut best);
                    }
                }
                "c" => {
                    if words.len() == 3 {
                        match words[1] {
                            "pid" => planner_pid = words[2].parse().ok(),
                            "joinTreeWidth" => {
                                if let (Some(ip), Ok(w)) = (current.as_mut(), words[2].parse()) {
                                    ip.tree.width = Some(w);
                                }
                            }
                            "seconds" => {
                                if let (Some(ip), Ok(s)) = (current.as_mut(), words[2].parse()) {
                                    ip.tree.planner_duration = s;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "p" => {
                    if current.is_some() {
                        return Err(DpveError::InputError(format!(
                            "multiple problem lines before line {}",
                            line_index
                        )));
                    }
                    if words.len() != 5 {
                        return Err(DpveError::InputError(format!(
                            "problem line {} has {} words (should be 5)",
                            line_index,
                            words.len()
                        )));
                    }
                    if words[1] != JOIN_TREE_WORD {
                        return Err(DpveError::InputError(format!(
                            "expected '{}'; found '{}' | line {}",
                            JOIN_TREE_WORD, words[1], line_index
                        )));
                    }
                    let declared_var_count: usize = words[2]
                        .parse()
                        .map_err(|_| DpveError::InputError(format!("bad var count | line {}", line_index)))?;
                    let declared_clause_count: usize = words[3]
                        .parse()
                        .map_err(|_| DpveError::InputError(format!("bad clause count | line {}", line_index)))?;
                    let declared_node_count: usize = words[4]
                        .parse()
                        .map_err(|_| DpveError::InputError(format!("bad node count | line {}", line_index)))?;
                    let mut tree = JoinTree::new(declared_var_count, declared_clause_count, declared_node_count);
                    tree.install_terminals(self.cnf);
                    current = Some(InProgress { tree, problem_seen: true });
                }
                _ => {
                    let ip = current.as_mut().ok_or_else(|| {
                        DpveError::InputError(format!("no problem line before internal node | line {}", line_index))
                    })?;
                    process_nonterminal_line(&words, ip, line_index)?;
                }
            }
        }

        if let Some(in_progress) = current {
            finalize(in_progress, &mut best);
        }

        best.ok_or(DpveError::PlannerAbsent)
    }
}

fn process_nonterminal_line(words: &[&str], ip: &mut InProgress, line_index: usize) -> DpveResult<()> {
    debug_assert!(ip.problem_seen);
    let parent_index: usize = words[0]
        .parse::<i64>()
        .ok()
        .and_then(|n| (n - 1).try_into().ok())
        .ok_or_else(|| DpveError::InputError(format!("bad internal-node index | line {}", line_index)))?;
    if parent_index < ip.tree.declared_clause_count || parent_index >= ip.tree.declared_node_count {
        return Err(DpveError::InputError(format!("wrong internal-node index | line {}", line_index)));
    }

    let mut children = Vec::new();
    let mut projection_vars = std::collections::HashSet::new();
    let mut parsing_elim_vars = false;
    for word in &words[1..] {
        if *word == ELIM_VARS_WORD {
            parsing_elim_vars = true;
            continue;
        }
        let num: i64 = word
            .parse()
            .map_err(|_| DpveError::InputError(format!("bad token '{}' | line {}", word, line_index)))?;
        if parsing_elim_vars {
            if num <= 0 || num as usize > ip.tree.declared_var_count {
                return Err(DpveError::InputError(format!(
                    "var '{}' inconsistent with declared var count '{}' | line {}",
                    num, ip.tree.declared_var_count, line_index
                )));
            }
            projection_vars.insert(num as usize);
        } else {
            let child_index = num - 1;
            if child_index < 0 || child_index as usize >= parent_index {
                return Err(DpveError::InputError(format!("child '{}' wrong | line {}", word, line_index)));
            }
            children.push(child_index as usize);
        }
    }
    ip.tree.add_nonterminal(parent_index, children, projection_vars);
    Ok(())
}

fn finalize(in_progress: InProgress, best: &mut Option<JoinTree>) {
    let mut tree = in_progress.tree;
    let expected_nonterminal_count = tree.declared_node_count - tree.declared_clause_count;
    let actual_nonterminal_count = tree.nodes[tree.declared_clause_count..].iter().filter(|n| n.is_some()).count();
    if actual_nonterminal_count < expected_nonterminal_count {
        log::warn!(
            "missing internal nodes ({} expected, {} found); discarding this candidate tree",
            expected_nonterminal_count,
            actual_nonterminal_count
        );
        return;
    }
    if tree.width.is_none() {
        tree.width = Some(tree.compute_width());
    }
    log::info!("processed join tree: width {}", tree.width.unwrap());
    let narrower = match best {
        None => true,
        Some(b) => tree.width < b.width,
    };
    if narrower {
        *best = Some(tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::Clause;
    use std::io::Cursor;

    fn two_clause_cnf() -> Cnf {
        let mut cnf = Cnf::new(0, false, false, true);
        for (a, b) in [(1, 2), (2, -1)] {
            let mut c = Clause::new(false);
            c.insert_literal(a);
            c.insert_literal(b);
            cnf.add_clause(c);
        }
        cnf.set_apparent_vars();
        cnf
    }

    #[test]
    fn reads_single_tree_to_completion() {
        let cnf = two_clause_cnf();
        let input = "p jt 2 2 3\n3 1 2 e 1 2\n=\n";
        let processor = JoinTreeProcessor::new(&cnf);
        let tree = processor.read(Cursor::new(input.as_bytes()), Duration::from_secs(0)).unwrap();
        assert_eq!(tree.declared_node_count, 3);
        assert_eq!(tree.width, Some(2));
    }

    #[test]
    fn keeps_narrower_of_two_trees() {
        let cnf = two_clause_cnf();
        // First tree reports width 5 explicitly (wider); second is narrower
        // and should replace it.
        let input = "p jt 2 2 3\nc joinTreeWidth 5\n3 1 2 e 1 2\n=\np jt 2 2 3\n3 1 2 e 1 2\n=\n";
        let processor = JoinTreeProcessor::new(&cnf);
        let tree = processor.read(Cursor::new(input.as_bytes()), Duration::from_secs(0)).unwrap();
        assert_eq!(tree.width, Some(2));
    }

    #[test]
    fn errors_without_any_tree() {
        let cnf = two_clause_cnf();
        let processor = JoinTreeProcessor::new(&cnf);
        let err = processor.read(Cursor::new(b"" as &[u8]), Duration::from_secs(0)).unwrap_err();
        assert!(matches!(err, DpveError::PlannerAbsent));
    }
}
