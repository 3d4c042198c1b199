// File: src/vm.rs
//
// The stack-based bytecode interpreter (spec §4.5). `Vm` owns the value
// stack, the call-frame stack, the table of global variables, and the
// heap. `interpret` can be called repeatedly on the same `Vm` (the REPL
// does this) — globals and heap state persist across calls.

use crate::chunk::OpCode;
use crate::compiler::compile;
use crate::errors::{CompileError, RuntimeError, StackFrame};
use crate::gc::Heap;
use crate::natives;
use crate::table::Table;
use crate::value::{values_equal, NativeFn, ObjData, ObjRef, UpvalueState, Value};

const FRAMES_MAX: usize = 64;
const STACK_MAX: usize = FRAMES_MAX * 256;

struct CallFrame {
    closure: ObjRef,
    ip: usize,
    slot_base: usize,
}

#[derive(Debug)]
pub enum InterpretError {
    Compile(Vec<CompileError>),
    Runtime(RuntimeError),
}

pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    open_upvalues: Vec<ObjRef>,
    globals: Table,
    heap: Heap,
    init_string: ObjRef,
    trace: bool,
}

impl Vm {
    pub fn new(trace: bool, stress_gc: bool) -> Self {
        let mut heap = Heap::new(stress_gc);
        let init_string = heap.intern("init");
        let mut vm = Vm {
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            open_upvalues: Vec::new(),
            globals: Table::new(),
            heap,
            init_string,
            trace,
        };
        vm.define_native("clock", 0, natives::clock_native);
        vm.define_native("deleteField", 2, natives::delete_field_native);
        vm
    }

    fn define_native(&mut self, name: &str, arity: u8, function: NativeFn) {
        let native_ref = self.heap.alloc_native(name, arity, function);
        let name_ref = self.heap.intern(name);
        let hash = self.heap.hash_of_str(name_ref);
        self.globals.set(name_ref, hash, Value::Obj(native_ref));
    }

    /// Compiles and runs `source` against this VM's existing globals and
    /// heap. Used once per `run` invocation, or repeatedly by the REPL.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        let function_ref = compile(source, &mut self.heap).map_err(InterpretError::Compile)?;
        let closure_ref = self.heap.alloc_closure(function_ref, Vec::new());
        self.push(Value::Obj(closure_ref));
        self.call(closure_ref, 0).map_err(InterpretError::Runtime)?;
        self.run().map_err(InterpretError::Runtime)
    }

    // --- stack helpers ------------------------------------------------

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    // --- bytecode reading -----------------------------------------------

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let closure = frame.closure;
        let ip = frame.ip;
        frame.ip += 1;
        let function_ref = self.heap.as_closure(closure).function;
        self.heap.chunk(function_ref).code[ip]
    }

    fn read_short(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte() as usize;
        let closure = self.frames.last().unwrap().closure;
        let function_ref = self.heap.as_closure(closure).function;
        self.heap.chunk(function_ref).constants[idx]
    }

    fn read_constant_long(&mut self) -> Value {
        let b0 = self.read_byte() as u32;
        let b1 = self.read_byte() as u32;
        let b2 = self.read_byte() as u32;
        let idx = (b0 | (b1 << 8) | (b2 << 16)) as usize;
        let closure = self.frames.last().unwrap().closure;
        let function_ref = self.heap.as_closure(closure).function;
        self.heap.chunk(function_ref).constants[idx]
    }

    fn read_name_constant(&mut self) -> ObjRef {
        match self.read_constant() {
            Value::Obj(r) => r,
            _ => unreachable!("name constant must be a string"),
        }
    }

    // --- the fetch-execute loop -----------------------------------------

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            self.maybe_collect();

            if self.trace {
                crate::debug::trace_stack(&self.heap, &self.stack);
                let closure = self.frames.last().unwrap().closure;
                let function_ref = self.heap.as_closure(closure).function;
                let ip = self.frames.last().unwrap().ip;
                crate::debug::disassemble_instruction(&self.heap, self.heap.chunk(function_ref), ip);
            }

            let instruction = self.read_byte();
            let op = match OpCode::try_from(instruction) {
                Ok(op) => op,
                Err(_) => return Err(self.runtime_error("Invalid bytecode instruction.")),
            };

            match op {
                OpCode::Constant => {
                    let v = self.read_constant();
                    self.push(v);
                }
                OpCode::ConstantLong => {
                    let v = self.read_constant_long();
                    self.push(v);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::Dup => {
                    let v = self.peek(0);
                    self.push(v);
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slot_base;
                    let v = self.stack[base + slot];
                    self.push(v);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slot_base;
                    let v = self.peek(0);
                    self.stack[base + slot] = v;
                }
                OpCode::GetGlobal => {
                    let name_ref = self.read_name_constant();
                    let hash = self.heap.hash_of_str(name_ref);
                    match self.globals.get(name_ref, hash) {
                        Some(v) => self.push(v),
                        None => {
                            let msg = format!("Undefined variable '{}'.", self.heap.as_str(name_ref));
                            return Err(self.runtime_error(msg));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name_ref = self.read_name_constant();
                    let hash = self.heap.hash_of_str(name_ref);
                    let value = self.peek(0);
                    self.globals.set(name_ref, hash, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name_ref = self.read_name_constant();
                    let hash = self.heap.hash_of_str(name_ref);
                    let value = self.peek(0);
                    if self.globals.set(name_ref, hash, value) {
                        self.globals.delete(name_ref, hash);
                        let msg = format!("Undefined variable '{}'.", self.heap.as_str(name_ref));
                        return Err(self.runtime_error(msg));
                    }
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure = self.frames.last().unwrap().closure;
                    let uv_ref = self.heap.as_closure(closure).upvalues[slot];
                    let value = match self.heap.as_upvalue(uv_ref).state {
                        UpvalueState::Open(s) => self.stack[s],
                        UpvalueState::Closed(v) => v,
                    };
                    self.push(value);
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure = self.frames.last().unwrap().closure;
                    let uv_ref = self.heap.as_closure(closure).upvalues[slot];
                    let value = self.peek(0);
                    match self.heap.as_upvalue(uv_ref).state {
                        UpvalueState::Open(s) => self.stack[s] = value,
                        UpvalueState::Closed(_) => self.heap.as_upvalue_mut(uv_ref).state = UpvalueState::Closed(value),
                    }
                }
                OpCode::GetProperty => {
                    let name_ref = self.read_name_constant();
                    let receiver = self.peek(0);
                    let instance_ref = match receiver {
                        Value::Obj(r) if matches!(self.heap.data(r), ObjData::Instance(_)) => r,
                        _ => return Err(self.runtime_error("Only instances have properties.")),
                    };
                    let hash = self.heap.hash_of_str(name_ref);
                    let field = self.heap.as_instance(instance_ref).fields.get(name_ref, hash);
                    if let Some(v) = field {
                        self.pop();
                        self.push(v);
                    } else {
                        let class_ref = self.heap.as_instance(instance_ref).class;
                        self.pop();
                        self.bind_method(class_ref, name_ref, receiver)?;
                    }
                }
                OpCode::SetProperty => {
                    let name_ref = self.read_name_constant();
                    let value = self.peek(0);
                    let receiver = self.peek(1);
                    let instance_ref = match receiver {
                        Value::Obj(r) if matches!(self.heap.data(r), ObjData::Instance(_)) => r,
                        _ => return Err(self.runtime_error("Only instances have fields.")),
                    };
                    let hash = self.heap.hash_of_str(name_ref);
                    self.heap.as_instance_mut(instance_ref).fields.set(name_ref, hash, value);
                    self.pop();
                    self.pop();
                    self.push(value);
                }
                OpCode::GetSuper => {
                    let name_ref = self.read_name_constant();
                    let superclass = self.pop();
                    let receiver = self.pop();
                    let class_ref = match superclass {
                        Value::Obj(r) => r,
                        _ => unreachable!("superclass operand must be a class"),
                    };
                    self.bind_method(class_ref, name_ref, receiver)?;
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(values_equal(a, b)));
                }
                OpCode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.divide()?,
                OpCode::Modulus => self.modulus()?,
                OpCode::Not => {
                    let v = self.pop();
                    self.push(Value::Bool(v.is_falsey()));
                }
                OpCode::Negate => {
                    let v = self.peek(0);
                    match v.as_number() {
                        Some(n) => {
                            self.pop();
                            self.push(Value::Number(-n));
                        }
                        None => return Err(self.runtime_error("Operand must be a number.")),
                    }
                }
                OpCode::Print => {
                    let v = self.pop();
                    println!("{}", self.heap.stringify(v));
                }
                OpCode::Jump => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short();
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                }
                OpCode::Conditional => {
                    let else_val = self.pop();
                    let then_val = self.pop();
                    let cond = self.pop();
                    self.push(if cond.is_falsey() { else_val } else { then_val });
                }
                OpCode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.peek(arg_count as usize);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Invoke => {
                    let name_ref = self.read_name_constant();
                    let arg_count = self.read_byte();
                    self.invoke(name_ref, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name_ref = self.read_name_constant();
                    let arg_count = self.read_byte();
                    let superclass = self.pop();
                    let class_ref = match superclass {
                        Value::Obj(r) => r,
                        _ => unreachable!("superclass operand must be a class"),
                    };
                    self.invoke_from_class(class_ref, name_ref, arg_count)?;
                }
                OpCode::Closure => {
                    let function_ref = match self.read_constant() {
                        Value::Obj(r) => r,
                        _ => unreachable!("closure operand must be a function"),
                    };
                    let upvalue_count = self.heap.as_function(function_ref).upvalue_count;
                    let mut upvalues = Vec::with_capacity(upvalue_count as usize);
                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte() != 0;
                        let index = self.read_byte() as usize;
                        if is_local {
                            let base = self.frames.last().unwrap().slot_base;
                            upvalues.push(self.capture_upvalue(base + index));
                        } else {
                            let enclosing = self.frames.last().unwrap().closure;
                            upvalues.push(self.heap.as_closure(enclosing).upvalues[index]);
                        }
                    }
                    let closure_ref = self.heap.alloc_closure(function_ref, upvalues);
                    self.push(Value::Obj(closure_ref));
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len() - 1);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().unwrap();
                    self.close_upvalues(frame.slot_base);
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(frame.slot_base);
                    self.push(result);
                }
                OpCode::Class => {
                    let name_ref = self.read_name_constant();
                    let class_ref = self.heap.alloc_class(name_ref);
                    self.push(Value::Obj(class_ref));
                }
                OpCode::Inherit => {
                    let superclass_val = self.peek(1);
                    let sub_ref = match self.peek(0) {
                        Value::Obj(r) => r,
                        _ => unreachable!("subclass operand must be a class"),
                    };
                    let super_ref = match superclass_val {
                        Value::Obj(r) if matches!(self.heap.data(r), ObjData::Class(_)) => r,
                        _ => return Err(self.runtime_error("Superclass must be a class.")),
                    };
                    let super_methods = self.heap.as_class(super_ref).methods.clone();
                    let super_init = self.heap.as_class(super_ref).init;
                    let sub = self.heap.as_class_mut(sub_ref);
                    sub.methods.add_all(&super_methods);
                    sub.init = super_init;
                    self.pop();
                }
                OpCode::Method => {
                    let name_ref = self.read_name_constant();
                    let method_value = self.peek(0);
                    let class_ref = match self.peek(1) {
                        Value::Obj(r) => r,
                        _ => unreachable!("method target must be a class"),
                    };
                    let hash = self.heap.hash_of_str(name_ref);
                    self.heap.as_class_mut(class_ref).methods.set(name_ref, hash, method_value);
                    if name_ref == self.init_string {
                        self.heap.as_class_mut(class_ref).init = Some(method_value);
                    }
                    self.pop();
                }
            }
        }
    }

    // --- arithmetic ------------------------------------------------------

    fn binary_number_op(&mut self, f: impl Fn(f64, f64) -> Value) -> Result<(), RuntimeError> {
        let (Some(a), Some(b)) = (self.peek(1).as_number(), self.peek(0).as_number()) else {
            return Err(self.runtime_error("Operands must be numbers."));
        };
        self.pop();
        self.pop();
        self.push(f(a, b));
        Ok(())
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);
        if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
            self.pop();
            self.pop();
            self.push(Value::Number(x + y));
            return Ok(());
        }
        let both_strings = matches!(a, Value::Obj(r) if matches!(self.heap.data(r), ObjData::Str(_)))
            && matches!(b, Value::Obj(r) if matches!(self.heap.data(r), ObjData::Str(_)));
        if !both_strings {
            return Err(self.runtime_error("Operands must be two numbers or two strings."));
        }
        let (a_ref, b_ref) = match (a, b) {
            (Value::Obj(ar), Value::Obj(br)) => (ar, br),
            _ => unreachable!(),
        };
        let concatenated = format!("{}{}", self.heap.as_str(a_ref), self.heap.as_str(b_ref));
        let result_ref = self.heap.intern(&concatenated);
        self.pop();
        self.pop();
        self.push(Value::Obj(result_ref));
        Ok(())
    }

    fn divide(&mut self) -> Result<(), RuntimeError> {
        let (Some(a), Some(b)) = (self.peek(1).as_number(), self.peek(0).as_number()) else {
            return Err(self.runtime_error("Operands must be numbers."));
        };
        if b == 0.0 {
            return Err(self.runtime_error("Divide by zero."));
        }
        self.pop();
        self.pop();
        self.push(Value::Number(a / b));
        Ok(())
    }

    fn modulus(&mut self) -> Result<(), RuntimeError> {
        let (Some(a), Some(b)) = (self.peek(1).as_number(), self.peek(0).as_number()) else {
            return Err(self.runtime_error("Operands must be numbers."));
        };
        if b == 0.0 {
            return Err(self.runtime_error("Modulo by zero."));
        }
        if a.fract() != 0.0 || b.fract() != 0.0 {
            return Err(self.runtime_error("Operands to '%' must be integers."));
        }
        self.pop();
        self.pop();
        // Non-positive operands are implementation-defined (spec §9's open
        // question); we follow Rust's `%`, which takes the sign of the dividend.
        self.push(Value::Number((a as i64 % b as i64) as f64));
        Ok(())
    }

    // --- calls -------------------------------------------------------------

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        match callee {
            Value::Obj(r) => match self.heap.data(r) {
                ObjData::Closure(_) => self.call(r, arg_count),
                ObjData::Native(_) => self.call_native(r, arg_count),
                ObjData::Class(_) => self.instantiate(r, arg_count),
                ObjData::BoundMethod(_) => self.call_bound_method(r, arg_count),
                _ => Err(self.runtime_error("Can only call functions and classes.")),
            },
            _ => Err(self.runtime_error("Can only call functions and classes.")),
        }
    }

    fn call(&mut self, closure_ref: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let function_ref = self.heap.as_closure(closure_ref).function;
        let arity = self.heap.as_function(function_ref).arity;
        if arg_count != arity {
            let msg = format!("Expected {arity} arguments but got {arg_count}.");
            return Err(self.runtime_error(msg));
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }
        let slot_base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame { closure: closure_ref, ip: 0, slot_base });
        Ok(())
    }

    fn call_native(&mut self, native_ref: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let (arity, function) = {
            let native = self.heap.as_native(native_ref);
            (native.arity, native.function)
        };
        if arg_count != arity {
            let msg = format!("Expected {arity} arguments but got {arg_count}.");
            return Err(self.runtime_error(msg));
        }
        let start = self.stack.len() - arg_count as usize;
        let args: Vec<Value> = self.stack[start..].to_vec();
        let result = match (function)(&mut self.heap, &args) {
            Ok(v) => v,
            Err(msg) => return Err(self.runtime_error(msg)),
        };
        self.stack.truncate(start - 1);
        self.push(result);
        Ok(())
    }

    fn instantiate(&mut self, class_ref: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let instance_ref = self.heap.alloc_instance(class_ref);
        let slot = self.stack.len() - arg_count as usize - 1;
        self.stack[slot] = Value::Obj(instance_ref);
        let init = self.heap.as_class(class_ref).init;
        if let Some(Value::Obj(init_closure)) = init {
            return self.call(init_closure, arg_count);
        }
        if arg_count != 0 {
            let msg = format!("Expected 0 arguments but got {arg_count}.");
            return Err(self.runtime_error(msg));
        }
        Ok(())
    }

    fn call_bound_method(&mut self, bound_ref: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let bound = self.heap.as_bound_method(bound_ref);
        let receiver = bound.receiver;
        let method = bound.method;
        let slot = self.stack.len() - arg_count as usize - 1;
        self.stack[slot] = receiver;
        self.call(method, arg_count)
    }

    fn invoke(&mut self, name_ref: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count as usize);
        let instance_ref = match receiver {
            Value::Obj(r) if matches!(self.heap.data(r), ObjData::Instance(_)) => r,
            _ => return Err(self.runtime_error("Only instances have methods.")),
        };
        let hash = self.heap.hash_of_str(name_ref);
        if let Some(field_value) = self.heap.as_instance(instance_ref).fields.get(name_ref, hash) {
            let slot = self.stack.len() - arg_count as usize - 1;
            self.stack[slot] = field_value;
            return self.call_value(field_value, arg_count);
        }
        let class_ref = self.heap.as_instance(instance_ref).class;
        self.invoke_from_class(class_ref, name_ref, arg_count)
    }

    fn invoke_from_class(&mut self, class_ref: ObjRef, name_ref: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let hash = self.heap.hash_of_str(name_ref);
        let method = self.heap.as_class(class_ref).methods.get(name_ref, hash);
        match method {
            Some(Value::Obj(closure_ref)) => self.call(closure_ref, arg_count),
            _ => {
                let msg = format!("Undefined property '{}'.", self.heap.as_str(name_ref));
                Err(self.runtime_error(msg))
            }
        }
    }

    fn bind_method(&mut self, class_ref: ObjRef, name_ref: ObjRef, receiver: Value) -> Result<(), RuntimeError> {
        let hash = self.heap.hash_of_str(name_ref);
        let method = self.heap.as_class(class_ref).methods.get(name_ref, hash);
        match method {
            Some(Value::Obj(closure_ref)) => {
                let bound = self.heap.alloc_bound_method(receiver, closure_ref);
                self.push(Value::Obj(bound));
                Ok(())
            }
            _ => {
                let msg = format!("Undefined property '{}'.", self.heap.as_str(name_ref));
                Err(self.runtime_error(msg))
            }
        }
    }

    // --- upvalues ------------------------------------------------------

    fn capture_upvalue(&mut self, slot: usize) -> ObjRef {
        for &uv_ref in &self.open_upvalues {
            if let UpvalueState::Open(s) = self.heap.as_upvalue(uv_ref).state {
                if s == slot {
                    return uv_ref;
                }
            }
        }
        let uv_ref = self.heap.alloc_open_upvalue(slot);
        let pos = self
            .open_upvalues
            .iter()
            .position(|&r| matches!(self.heap.as_upvalue(r).state, UpvalueState::Open(s) if s < slot))
            .unwrap_or(self.open_upvalues.len());
        self.open_upvalues.insert(pos, uv_ref);
        uv_ref
    }

    fn close_upvalues(&mut self, from_slot: usize) {
        let mut remaining = Vec::with_capacity(self.open_upvalues.len());
        for &r in &self.open_upvalues {
            let slot = match self.heap.as_upvalue(r).state {
                UpvalueState::Open(s) => s,
                UpvalueState::Closed(_) => continue,
            };
            if slot >= from_slot {
                let value = self.stack[slot];
                self.heap.as_upvalue_mut(r).state = UpvalueState::Closed(value);
            } else {
                remaining.push(r);
            }
        }
        self.open_upvalues = remaining;
    }

    // --- garbage collection -----------------------------------------------

    fn maybe_collect(&mut self) {
        if !self.heap.needs_collect() {
            return;
        }
        self.mark_roots();
        self.heap.collect_garbage();
    }

    fn mark_roots(&mut self) {
        let stack_values: Vec<Value> = self.stack.clone();
        for v in stack_values {
            self.heap.mark_value(v);
        }
        let frame_closures: Vec<ObjRef> = self.frames.iter().map(|f| f.closure).collect();
        for c in frame_closures {
            self.heap.mark_object(c);
        }
        let open_upvalues = self.open_upvalues.clone();
        for u in open_upvalues {
            self.heap.mark_object(u);
        }
        let globals = std::mem::replace(&mut self.globals, Table::new());
        self.heap.mark_table(&globals);
        self.globals = globals;
        self.heap.mark_object(self.init_string);
    }

    // --- errors ------------------------------------------------------------

    fn runtime_error(&mut self, message: impl Into<String>) -> RuntimeError {
        let message = message.into();
        let mut trace = Vec::new();
        for frame in self.frames.iter().rev() {
            let function_ref = self.heap.as_closure(frame.closure).function;
            let function = self.heap.as_function(function_ref);
            let line = function.chunk.get_line(frame.ip.saturating_sub(1));
            let name = match function.name {
                Some(n) => format!("{}()", self.heap.as_str(n)),
                None => "script".to_string(),
            };
            trace.push(StackFrame { name, line });
        }
        let line = trace.first().map(|f| f.line).unwrap_or(0);
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
        RuntimeError::new(message, line).with_trace(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<(), InterpretError> {
        let mut vm = Vm::new(false, false);
        vm.interpret(source)
    }

    #[test]
    fn runs_arithmetic_and_prints() {
        assert!(run("print 1 + 2 * 3;").is_ok());
    }

    #[test]
    fn closures_capture_and_mutate_upvalues() {
        let source = r#"
            fun counter() {
                var i = 0;
                fun inc() { i = i + 1; return i; }
                return inc;
            }
            var c = counter();
            c(); c();
        "#;
        assert!(run(source).is_ok());
    }

    #[test]
    fn classes_support_inheritance_and_super() {
        let source = r#"
            class Animal {
                speak() { return "..."; }
            }
            class Dog < Animal {
                speak() { return super.speak() + " woof"; }
            }
            var d = Dog();
            print d.speak();
        "#;
        assert!(run(source).is_ok());
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        match run("print nope;") {
            Err(InterpretError::Runtime(_)) => {}
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }

    #[test]
    fn stress_gc_survives_a_program() {
        let mut vm = Vm::new(false, true);
        let source = r#"
            class Pair {
                init(a, b) { this.a = a; this.b = b; }
            }
            var p = nil;
            for (var i = 0; i < 50; i = i + 1) {
                p = Pair(i, "suffix");
            }
            print p.b;
        "#;
        assert!(vm.interpret(source).is_ok());
    }
}
