// File: src/debug.rs
//
// Bytecode disassembler, enabled by `--trace` / `WISP_TRACE_EXECUTION`
// (spec §4.1, §10). Mirrors the VM's own instruction decoding exactly —
// any drift here would make traces lie about what actually ran.

use crate::chunk::{Chunk, OpCode};
use crate::gc::Heap;
use crate::value::Value;

pub fn disassemble_chunk(heap: &Heap, chunk: &Chunk, name: &str) {
    eprintln!("== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(heap, chunk, offset);
    }
}

pub fn trace_stack(heap: &Heap, stack: &[Value]) {
    eprint!("          ");
    for value in stack {
        eprint!("[ {} ]", heap.stringify(*value));
    }
    eprintln!();
}

/// Prints the instruction at `offset` and returns the offset of the next
/// one, the same width-decoding the VM itself uses.
pub fn disassemble_instruction(heap: &Heap, chunk: &Chunk, offset: usize) -> usize {
    eprint!("{offset:04} ");
    let line = chunk.get_line(offset);
    if offset > 0 && line == chunk.get_line(offset - 1) {
        eprint!("   | ");
    } else {
        eprint!("{line:4} ");
    }

    let byte = chunk.code[offset];
    let op = match OpCode::try_from(byte) {
        Ok(op) => op,
        Err(_) => {
            eprintln!("Unknown opcode {byte}");
            return offset + 1;
        }
    };

    match op {
        OpCode::Constant => constant_instruction(heap, "OP_CONSTANT", chunk, offset),
        OpCode::ConstantLong => constant_long_instruction(heap, "OP_CONSTANT_LONG", chunk, offset),
        OpCode::Nil => simple_instruction("OP_NIL", offset),
        OpCode::True => simple_instruction("OP_TRUE", offset),
        OpCode::False => simple_instruction("OP_FALSE", offset),
        OpCode::Pop => simple_instruction("OP_POP", offset),
        OpCode::Dup => simple_instruction("OP_DUP", offset),
        OpCode::GetLocal => byte_instruction("OP_GET_LOCAL", chunk, offset),
        OpCode::SetLocal => byte_instruction("OP_SET_LOCAL", chunk, offset),
        OpCode::GetGlobal => constant_instruction(heap, "OP_GET_GLOBAL", chunk, offset),
        OpCode::DefineGlobal => constant_instruction(heap, "OP_DEFINE_GLOBAL", chunk, offset),
        OpCode::SetGlobal => constant_instruction(heap, "OP_SET_GLOBAL", chunk, offset),
        OpCode::GetUpvalue => byte_instruction("OP_GET_UPVALUE", chunk, offset),
        OpCode::SetUpvalue => byte_instruction("OP_SET_UPVALUE", chunk, offset),
        OpCode::GetProperty => constant_instruction(heap, "OP_GET_PROPERTY", chunk, offset),
        OpCode::SetProperty => constant_instruction(heap, "OP_SET_PROPERTY", chunk, offset),
        OpCode::GetSuper => constant_instruction(heap, "OP_GET_SUPER", chunk, offset),
        OpCode::Equal => simple_instruction("OP_EQUAL", offset),
        OpCode::Greater => simple_instruction("OP_GREATER", offset),
        OpCode::Less => simple_instruction("OP_LESS", offset),
        OpCode::Add => simple_instruction("OP_ADD", offset),
        OpCode::Subtract => simple_instruction("OP_SUBTRACT", offset),
        OpCode::Multiply => simple_instruction("OP_MULTIPLY", offset),
        OpCode::Divide => simple_instruction("OP_DIVIDE", offset),
        OpCode::Modulus => simple_instruction("OP_MODULUS", offset),
        OpCode::Not => simple_instruction("OP_NOT", offset),
        OpCode::Negate => simple_instruction("OP_NEGATE", offset),
        OpCode::Print => simple_instruction("OP_PRINT", offset),
        OpCode::Jump => jump_instruction("OP_JUMP", 1, chunk, offset),
        OpCode::JumpIfFalse => jump_instruction("OP_JUMP_IF_FALSE", 1, chunk, offset),
        OpCode::Loop => jump_instruction("OP_LOOP", -1, chunk, offset),
        OpCode::Call => byte_instruction("OP_CALL", chunk, offset),
        OpCode::Invoke => invoke_instruction(heap, "OP_INVOKE", chunk, offset),
        OpCode::SuperInvoke => invoke_instruction(heap, "OP_SUPER_INVOKE", chunk, offset),
        OpCode::Closure => closure_instruction(heap, chunk, offset),
        OpCode::CloseUpvalue => simple_instruction("OP_CLOSE_UPVALUE", offset),
        OpCode::Return => simple_instruction("OP_RETURN", offset),
        OpCode::Class => constant_instruction(heap, "OP_CLASS", chunk, offset),
        OpCode::Inherit => simple_instruction("OP_INHERIT", offset),
        OpCode::Method => constant_instruction(heap, "OP_METHOD", chunk, offset),
        OpCode::Conditional => simple_instruction("OP_CONDITIONAL", offset),
    }
}

fn simple_instruction(name: &str, offset: usize) -> usize {
    eprintln!("{name}");
    offset + 1
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    eprintln!("{name:<16} {slot:4}");
    offset + 2
}

fn jump_instruction(name: &str, sign: i32, chunk: &Chunk, offset: usize) -> usize {
    let hi = chunk.code[offset + 1] as u16;
    let lo = chunk.code[offset + 2] as u16;
    let jump = ((hi << 8) | lo) as i32;
    let target = offset as i32 + 3 + sign * jump;
    eprintln!("{name:<16} {offset:4} -> {target}");
    offset + 3
}

fn constant_instruction(heap: &Heap, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let value = chunk.constants[index];
    eprintln!("{name:<16} {index:4} '{}'", heap.stringify(value));
    offset + 2
}

fn constant_long_instruction(heap: &Heap, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let b0 = chunk.code[offset + 1] as u32;
    let b1 = chunk.code[offset + 2] as u32;
    let b2 = chunk.code[offset + 3] as u32;
    let index = (b0 | (b1 << 8) | (b2 << 16)) as usize;
    let value = chunk.constants[index];
    eprintln!("{name:<16} {index:4} '{}'", heap.stringify(value));
    offset + 4
}

fn invoke_instruction(heap: &Heap, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let const_index = chunk.code[offset + 1] as usize;
    let arg_count = chunk.code[offset + 2];
    let value = chunk.constants[const_index];
    eprintln!("{name:<16} ({arg_count} args) {const_index:4} '{}'", heap.stringify(value));
    offset + 3
}

fn closure_instruction(heap: &Heap, chunk: &Chunk, offset: usize) -> usize {
    let mut offset = offset + 1;
    let const_index = chunk.code[offset] as usize;
    offset += 1;
    let value = chunk.constants[const_index];
    eprintln!("{:<16} {const_index:4} '{}'", "OP_CLOSURE", heap.stringify(value));

    let function_ref = match value {
        Value::Obj(r) => r,
        _ => return offset,
    };
    let upvalue_count = heap.as_function(function_ref).upvalue_count;
    for _ in 0..upvalue_count {
        let is_local = chunk.code[offset];
        let index = chunk.code[offset + 1];
        let kind = if is_local != 0 { "local" } else { "upvalue" };
        eprintln!("{offset:04}      |                     {kind} {index}");
        offset += 2;
    }
    offset
}
