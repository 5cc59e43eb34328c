//! Ternuino - CLI entry point
//!
//! Commands:
//! - `ternuino run <program.asm>` - Assemble and run a program
//! - `ternuino debug <program.asm>` - Interactive stepper
//! - `ternuino dump <file.t3>` - Print a ternary file's contents

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ternuino")]
#[command(version = "0.1.0")]
#[command(about = "A virtual balanced ternary computer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and run a program until it halts
    Run {
        /// Path to the assembly source file
        program: String,
        /// Data memory size in cells (1-27)
        #[arg(short, long, default_value = "27")]
        dmem_size: usize,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Print one line per executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(short, long)]
        json: bool,
        /// Attach the interactive terminal (raw keyboard input)
        #[arg(long)]
        terminal: bool,
        /// Install an interrupt handler, e.g. --handler 1=on_key
        #[arg(long = "handler", value_name = "VECTOR=TARGET")]
        handlers: Vec<String>,
    },
    /// Step through a program interactively
    Debug {
        /// Path to the assembly source file
        program: String,
        /// Data memory size in cells (1-27)
        #[arg(short, long, default_value = "27")]
        dmem_size: usize,
        /// Install an interrupt handler, e.g. --handler 1=on_key
        #[arg(long = "handler", value_name = "VECTOR=TARGET")]
        handlers: Vec<String>,
    },
    /// Print a ternary file's header and values
    Dump {
        /// Path to the .t3 file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            program,
            dmem_size,
            max_cycles,
            trace,
            json,
            terminal,
            handlers,
        }) => {
            run_program(&program, dmem_size, max_cycles, trace, json, terminal, &handlers);
        }
        Some(Commands::Debug {
            program,
            dmem_size,
            handlers,
        }) => {
            debug_program(&program, dmem_size, &handlers);
        }
        Some(Commands::Dump { file }) => {
            dump_file(&file);
        }
        None => {
            println!("Ternuino v0.1.0");
            println!("A virtual balanced ternary computer");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_ternary_primitives();
        }
    }
}

fn run_program(
    path: &str,
    dmem_size: usize,
    max_cycles: u64,
    trace: bool,
    json: bool,
    terminal: bool,
    handlers: &[String],
) {
    let program = load_source(path);
    if !json {
        println!("🔧 Running: {}", path);
        println!(
            "📝 Assembled {} instruction(s), {} data cell(s)",
            program.instructions.len(),
            program.data.len()
        );
    }

    let mut cpu = make_cpu(&program, dmem_size);
    let captured = attach_devices(&mut cpu, terminal);
    install_handlers(&mut cpu, &program, handlers);

    if trace && !json {
        println!();
        println!("━━━ Execution ━━━");
    }

    let executed = if trace {
        let mut executed = 0u64;
        while cpu.is_running() && executed < max_cycles {
            let pc = cpu.regs.pc;
            if let Some(instr) = cpu.step() {
                let text = instr.to_string();
                println!(
                    "{:>5}  {:02}: {:<18} A={:<11} B={:<11} C={}",
                    executed, pc, text, cpu.regs.a, cpu.regs.b, cpu.regs.c
                );
                executed += 1;
            }
        }
        executed
    } else {
        cpu.run_limited(max_cycles)
    };

    // The interactive terminal leaves raw mode when its device drops;
    // unregister before printing the report
    if terminal {
        cpu.devices.unregister(0);
    }

    if json {
        print_json_report(&cpu, executed);
        return;
    }

    print_report(&cpu, executed, max_cycles);
    if let Some(console) = captured {
        let output = console.output_string();
        if !output.is_empty() {
            println!();
            println!("━━━ Terminal output ━━━");
            println!("{}", output);
        }
    }
}

fn debug_program(path: &str, dmem_size: usize, handlers: &[String]) {
    use std::io::{self, Write};

    let program = load_source(path);
    println!("🔍 Debugging: {}", path);
    println!(
        "📝 Assembled {} instruction(s), {} data cell(s)",
        program.instructions.len(),
        program.data.len()
    );

    let mut cpu = make_cpu(&program, dmem_size);
    let captured = attach_devices(&mut cpu, false);
    install_handlers(&mut cpu, &program, handlers);

    println!();
    println!("Commands: step [n], run, regs, mem, irq, reset, quit");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("ternuino> ");
        if io::stdout().flush().is_err() {
            break;
        }
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("❌ Input error: {}", e);
                break;
            }
        }

        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(word) => word,
            None => continue,
        };

        match command {
            "s" | "step" => {
                let count: u64 = words.next().and_then(|w| w.parse().ok()).unwrap_or(1);
                for _ in 0..count {
                    if !step_once(&mut cpu) {
                        break;
                    }
                }
            }
            "r" | "run" => {
                let executed = cpu.run_limited(100_000);
                println!("  executed {} instruction(s), state: {:?}", executed, cpu.state);
            }
            "regs" => print_registers(&cpu),
            "mem" => print_memory(&cpu),
            "irq" => print_vectors(&cpu),
            "reset" => {
                cpu.reset();
                println!("  reset (program, data and devices kept)");
            }
            "h" | "help" | "?" => {
                println!("  step [n]  execute the next instruction(s)");
                println!("  run       run until halt (or 100000 instructions)");
                println!("  regs      show registers and cycle count");
                println!("  mem       show data memory");
                println!("  irq       show the interrupt controller");
                println!("  reset     zero registers, keep program and data");
                println!("  quit      leave the debugger");
            }
            "q" | "quit" => break,
            _ => println!("  unknown command '{}' (try 'help')", command),
        }
    }

    if let Some(console) = captured {
        let output = console.output_string();
        if !output.is_empty() {
            println!();
            println!("━━━ Terminal output ━━━");
            println!("{}", output);
        }
    }
}

fn dump_file(path: &str) {
    use ternuino::t3::T3Reader;
    use ternuino::ternary::decode_value;

    let mut reader = match T3Reader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("❌ Failed to open {}: {}", path, e);
            std::process::exit(1);
        }
    };

    println!("📖 {}", path);
    println!("Header: T3FMT v1, {} value(s) declared", reader.declared_count());
    println!();

    let mut read = 0u32;
    loop {
        match reader.read_digits() {
            Ok(Some(digits)) => {
                match decode_value(&digits) {
                    Ok(value) => println!("{:>4}: {:>14}  = {}", read, digits, value),
                    Err(e) => {
                        eprintln!("❌ Record {}: {}", read, e);
                        std::process::exit(1);
                    }
                }
                read += 1;
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("❌ Read error at record {}: {}", read, e);
                std::process::exit(1);
            }
        }
    }

    if read != reader.declared_count() {
        println!();
        println!(
            "⚠️  Header declares {} value(s) but the file holds {}",
            reader.declared_count(),
            read
        );
    }
}

/// Read and assemble a source file, exiting with a diagnostic on failure.
fn load_source(path: &str) -> ternuino::Program {
    use ternuino::assemble;

    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("❌ Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };
    match assemble(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    }
}

fn make_cpu(program: &ternuino::Program, dmem_size: usize) -> ternuino::Cpu {
    use ternuino::{Cpu, DMEM_CAPACITY};

    if dmem_size == 0 || dmem_size > DMEM_CAPACITY {
        eprintln!("❌ Data memory size must be 1-{}, got {}", DMEM_CAPACITY, dmem_size);
        std::process::exit(1);
    }

    let mut cpu = Cpu::new(dmem_size);
    if let Err(e) = cpu.load_program(&program.instructions) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = cpu.load_data(&program.data) {
        eprintln!("❌ Failed to load data image: {}", e);
        std::process::exit(1);
    }
    cpu
}

/// Wire the standard device complement: terminal at slot 0 (vector 1),
/// file devices at slots 1 and 2 (vectors 2 and 3). Returns the scripted
/// console handle when running headless so its output can be shown later.
fn attach_devices(
    cpu: &mut ternuino::Cpu,
    interactive: bool,
) -> Option<ternuino::dev::ScriptedConsole> {
    use ternuino::dev::{FileDevice, ScriptedConsole, StdioConsole, Terminal};

    let captured = if interactive {
        match StdioConsole::new() {
            Ok(console) => {
                cpu.devices.register(Box::new(Terminal::new(console, 1)));
                None
            }
            Err(e) => {
                eprintln!("❌ Failed to open the terminal: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let console = ScriptedConsole::new();
        cpu.devices.register(Box::new(Terminal::new(console.clone(), 1)));
        Some(console)
    };

    cpu.devices.register(Box::new(FileDevice::new(1, 2)));
    cpu.devices.register(Box::new(FileDevice::new(2, 3)));
    captured
}

/// Install `--handler VECTOR=TARGET` specs. There is no opcode for the
/// vector table, so handlers are wired from the host side.
fn install_handlers(cpu: &mut ternuino::Cpu, program: &ternuino::Program, handlers: &[String]) {
    for spec in handlers {
        let (vector, addr) = parse_handler(spec, program);
        cpu.irq.set_handler(vector, addr);
        cpu.irq.enable(vector);
    }
}

fn parse_handler(spec: &str, program: &ternuino::Program) -> (usize, i32) {
    use ternuino::asm::Section;
    use ternuino::VECTOR_COUNT;

    let (vector, target) = match spec.split_once('=') {
        Some(pair) => pair,
        None => {
            eprintln!("❌ Bad handler spec '{}' (expected VECTOR=TARGET)", spec);
            std::process::exit(1);
        }
    };
    let vector: usize = match vector.trim().parse() {
        Ok(v) if v < VECTOR_COUNT => v,
        _ => {
            eprintln!("❌ Bad vector in '{}' (expected 0-{})", spec, VECTOR_COUNT - 1);
            std::process::exit(1);
        }
    };

    let target = target.trim();
    if let Ok(addr) = target.parse::<i32>() {
        return (vector, addr);
    }
    match program.symbols.get(target) {
        Some(symbol) if symbol.section == Section::Text => (vector, symbol.address),
        Some(_) => {
            eprintln!("❌ Handler '{}' names a data cell, not an instruction", target);
            std::process::exit(1);
        }
        None => {
            eprintln!("❌ Unknown handler label '{}'", target);
            std::process::exit(1);
        }
    }
}

fn print_report(cpu: &ternuino::Cpu, executed: u64, max_cycles: u64) {
    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", executed);
    println!("State:  {:?}", cpu.state);
    println!("A  = {}", cpu.regs.a);
    println!("B  = {}", cpu.regs.b);
    println!("C  = {}", cpu.regs.c);
    println!("pc = {}", cpu.regs.pc);

    let nonzero: Vec<(usize, i32)> = cpu
        .dmem
        .cells()
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, value)| value != 0)
        .collect();
    if !nonzero.is_empty() {
        println!("Data (nonzero cells):");
        for (addr, value) in nonzero {
            println!("  [{:02}] = {}", addr, value);
        }
    }

    if cpu.is_running() && executed >= max_cycles {
        println!();
        println!(
            "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
            max_cycles
        );
    }
}

fn print_json_report(cpu: &ternuino::Cpu, executed: u64) {
    use ternuino::{CpuState, Registers};

    #[derive(serde::Serialize)]
    struct Report<'a> {
        state: CpuState,
        cycles: u64,
        registers: Registers,
        data: &'a [i32],
    }

    let report = Report {
        state: cpu.state,
        cycles: executed,
        registers: cpu.regs,
        data: cpu.dmem.cells(),
    };
    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("❌ Failed to serialize the report: {}", e);
            std::process::exit(1);
        }
    }
}

/// Execute one instruction in the debugger, echoing what ran. Returns
/// false once the machine has halted.
fn step_once(cpu: &mut ternuino::Cpu) -> bool {
    if !cpu.is_running() {
        println!("  machine is halted");
        return false;
    }
    let pc = cpu.regs.pc;
    match cpu.step() {
        Some(instr) => {
            let text = instr.to_string();
            println!(
                "  {:02}: {:<18} A={:<11} B={:<11} C={}",
                pc, text, cpu.regs.a, cpu.regs.b, cpu.regs.c
            );
        }
        None => println!("  {:02}: (empty slot)", pc),
    }
    true
}

fn print_registers(cpu: &ternuino::Cpu) {
    use ternuino::ternary::encode_value;

    println!("  A  = {:<11} {}", cpu.regs.a, encode_value(cpu.regs.a));
    println!("  B  = {:<11} {}", cpu.regs.b, encode_value(cpu.regs.b));
    println!("  C  = {:<11} {}", cpu.regs.c, encode_value(cpu.regs.c));
    println!(
        "  pc = {:<11} cycles = {}  state = {:?}",
        cpu.regs.pc, cpu.cycles, cpu.state
    );
}

fn print_memory(cpu: &ternuino::Cpu) {
    for (row, chunk) in cpu.dmem.cells().chunks(9).enumerate() {
        print!("  [{:02}]", row * 9);
        for value in chunk {
            print!(" {:>6}", value);
        }
        println!();
    }
}

fn print_vectors(cpu: &ternuino::Cpu) {
    println!(
        "  global={} in_interrupt={} pending={:?}",
        cpu.irq.global_enabled(),
        cpu.irq.in_interrupt(),
        cpu.irq.pending()
    );
    for (vector, entry) in cpu.irq.vectors().iter().enumerate() {
        println!(
            "  {}: handler={:02} enabled={}",
            vector, entry.handler, entry.enabled
        );
    }
}

fn demo_ternary_primitives() {
    use ternuino::ternary::{encode_value, tabs, tand, tcmpr, tnot, tor, tshl3, tshr3, tsign};

    println!("━━━ Balanced Ternary Demo ━━━");
    println!();

    println!("Scalar primitives:");
    println!("  tsign(-7)   = {}", tsign(-7));
    println!("  tabs(-7)    = {}", tabs(-7));
    println!("  tshl3(5)    = {}", tshl3(5));
    println!("  tshr3(17)   = {}", tshr3(17));
    println!("  tcmpr(3, 8) = {}", tcmpr(3, 8));
    println!();

    println!("Kleene logic (AND=min, OR=max, NOT=negate):");
    println!("  tand(-1, 1) = {}", tand(-1, 1));
    println!("  tor(-1, 1)  = {}", tor(-1, 1));
    println!("  tnot(1)     = {}", tnot(1));
    println!();

    println!("Digit strings:");
    for value in [5, -4, 42] {
        println!("  {:>3} = {}", value, encode_value(value));
    }
}
