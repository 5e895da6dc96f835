#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use molscript::{Engine, EngineConfig};

#[derive(Debug, Arbitrary)]
enum Operand {
    Int(i16),
    Float(u8),
    Str(bool),
    Var(u8),
    Array,
    Point,
}

#[derive(Debug, Arbitrary)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Lt,
    And,
    Or,
}

#[derive(Debug, Arbitrary)]
enum Stmt {
    Assign(u8, Operand, BinOp, Operand),
    Print(Operand, BinOp, Operand),
    If(Operand, Vec<Stmt>),
    For(u8, Vec<Stmt>),
    Try(Vec<Stmt>),
    Call(Operand),
}

fn operand(op: &Operand) -> String {
    match op {
        Operand::Int(i) => i.to_string(),
        Operand::Float(f) => format!("{}.5", f),
        Operand::Str(true) => "\"12\"".to_string(),
        Operand::Str(false) => "\"ab\"".to_string(),
        Operand::Var(v) => format!("v{}", v % 4),
        Operand::Array => "[1, 2, 3]".to_string(),
        Operand::Point => "{1 2 3}".to_string(),
    }
}

fn binop(op: &BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Lt => "<",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

fn render(stmts: &[Stmt], depth: usize, out: &mut String) {
    for stmt in stmts.iter().take(8) {
        match stmt {
            Stmt::Assign(v, a, op, b) => {
                out.push_str(&format!("v{} = {} {} {}\n", v % 4, operand(a), binop(op), operand(b)));
            }
            Stmt::Print(a, op, b) => {
                out.push_str(&format!("print {} {} {}\n", operand(a), binop(op), operand(b)));
            }
            Stmt::If(cond, body) if depth < 3 => {
                out.push_str(&format!("if ({}) {{\n", operand(cond)));
                render(body, depth + 1, out);
                out.push_str("}\n");
            }
            Stmt::For(n, body) if depth < 3 => {
                out.push_str(&format!("for (var i = 0; i < {}; i++) {{\n", n % 8));
                render(body, depth + 1, out);
                out.push_str("}\n");
            }
            Stmt::Try(body) if depth < 3 => {
                out.push_str("try {\n");
                render(body, depth + 1, out);
                out.push_str("} catch (e) {\n print e\n}\n");
            }
            Stmt::Call(arg) => out.push_str(&format!("print f({})\n", operand(arg))),
            _ => {}
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(stmts) = Vec::<Stmt>::arbitrary(&mut u) else {
        return;
    };
    let mut script = String::from("v0 = 0\nv1 = 1\nv2 = 2\nv3 = 3\nfunction f(a) {\n return a\n}\n");
    render(&stmts, 0, &mut script);

    let mut engine = Engine::new(EngineConfig::default().with_max_call_depth(32));
    // Runtime errors are fine; panics are not
    let _ = engine.execute(&script);
});
