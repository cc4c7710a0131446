// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disassembler example.
//!
//! Compiles `{v: k for k, v <- {"Hello": 3, "xsw": 1}, v <= 2}`, prints the listing and runs it.
//!
//! Run with:
//! `RUST_LOG=exprvm=debug cargo run -p exprvm --example disasm`

use exprvm::builder::Builder;
use exprvm::comprehension::{Comprehension, ForPhrase, Var};
use exprvm::context::Context;
use exprvm::disasm::disassemble;
use exprvm::ops::Op;
use exprvm::types::{Kind, Type};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let source = Type::map_of(Kind::String.ty(), Kind::Int.ty())?;
    let target = Type::map_of(Kind::Int.ty(), Kind::String.ty())?;
    let k = Var::new(Kind::String.ty(), "k");
    let v = Var::new(Kind::Int.ty(), "v");
    let phrase = ForPhrase::new(Some(&k), &v, source);
    let comp = Comprehension::new(target);

    let mut b = Builder::new();
    b.begin_comprehension(&comp)?;
    b.push("Hello")?.push(3)?.push("xsw")?.push(1)?.make_map(source, 2)?;
    b.for_phrase(&phrase)?.define_var(&[&k, &v])?;
    b.load_var(&v)?.push(2)?.builtin_op(Kind::Int, Op::Le)?;
    b.filter_for_phrase(&phrase)?;
    b.load_var(&v)?.load_var(&k)?;
    b.end_for_phrase(&phrase)?.end_comprehension(&comp)?;
    let code = b.resolve()?;

    println!("{}", disassemble(&code));

    let mut ctx = Context::new(&code);
    ctx.exec(0, code.len())?;
    if let Some(result) = ctx.pop() {
        println!("{result}");
    }
    Ok(())
}
