// File: src/gc.rs
//
// The heap: an arena of objects plus a tri-color mark-sweep collector
// (spec §4.6). Objects are never moved, so an `ObjRef` stays valid for
// its object's whole lifetime; a freed slot is recycled via `free_list`.

use crate::chunk::Chunk;
use crate::table::{fnv1a_hash, Table};
use crate::value::{
    BoundMethodObj, ClassObj, ClosureObj, FunctionObj, InstanceObj, NativeFn, NativeObj, ObjData,
    ObjRef, StrObj, UpvalueObj, UpvalueState, Value,
};

pub const GC_HEAP_GROW_FACTOR: usize = 2;
const INITIAL_GC_THRESHOLD: usize = 1024 * 1024;

pub struct ObjHeader {
    marked: bool,
    size: usize,
    pub data: ObjData,
}

pub struct Heap {
    slots: Vec<Option<ObjHeader>>,
    free_list: Vec<usize>,
    strings: Table,
    bytes_allocated: usize,
    next_gc: usize,
    gray_stack: Vec<ObjRef>,
    start_time: std::time::Instant,
    pub stress_gc: bool,
}

impl Heap {
    pub fn new(stress_gc: bool) -> Self {
        Heap {
            slots: Vec::new(),
            free_list: Vec::new(),
            strings: Table::new(),
            bytes_allocated: 0,
            next_gc: INITIAL_GC_THRESHOLD,
            gray_stack: Vec::new(),
            start_time: std::time::Instant::now(),
            stress_gc,
        }
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Seconds elapsed since this heap (and thus the VM process) started.
    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn needs_collect(&self) -> bool {
        self.stress_gc || self.bytes_allocated > self.next_gc
    }

    // --- raw allocation -----------------------------------------------

    fn alloc_raw(&mut self, data: ObjData) -> ObjRef {
        let size = estimate_size(&data);
        self.bytes_allocated += size;
        let header = ObjHeader { marked: false, size, data };
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx] = Some(header);
            ObjRef(idx)
        } else {
            self.slots.push(Some(header));
            ObjRef(self.slots.len() - 1)
        }
    }

    pub fn header(&self, r: ObjRef) -> &ObjHeader {
        self.slots[r.0].as_ref().expect("dangling ObjRef")
    }

    fn header_mut(&mut self, r: ObjRef) -> &mut ObjHeader {
        self.slots[r.0].as_mut().expect("dangling ObjRef")
    }

    pub fn data(&self, r: ObjRef) -> &ObjData {
        &self.header(r).data
    }

    pub fn data_mut(&mut self, r: ObjRef) -> &mut ObjData {
        &mut self.header_mut(r).data
    }

    pub fn is_marked(&self, r: ObjRef) -> bool {
        self.header(r).marked
    }

    // --- typed constructors ---------------------------------------------

    /// Interns `s`: returns the existing `ObjRef` if an equal string is
    /// already on the heap, otherwise allocates a new one and registers it.
    pub fn intern(&mut self, s: &str) -> ObjRef {
        let hash = fnv1a_hash(s.as_bytes());
        let slots = &self.slots;
        let existing = self.strings.find_string(s, hash, |r| {
            matches!(&slots[r.0], Some(h) if matches!(&h.data, ObjData::Str(so) if so.value.as_ref() == s))
        });
        if let Some(r) = existing {
            return r;
        }
        let r = self.alloc_raw(ObjData::Str(StrObj { value: s.into(), hash }));
        self.strings.set(r, hash, Value::Nil);
        r
    }

    pub fn alloc_function(&mut self) -> ObjRef {
        self.alloc_raw(ObjData::Function(FunctionObj::new()))
    }

    /// Allocates a function whose chunk has already been fully compiled
    /// (the compiler builds `FunctionObj`s off-heap, one per nested
    /// function, and only allocates them once their body is finished).
    pub fn alloc_function_obj(&mut self, function: FunctionObj) -> ObjRef {
        self.alloc_raw(ObjData::Function(function))
    }

    pub fn alloc_native(&mut self, name: &str, arity: u8, function: NativeFn) -> ObjRef {
        let name_ref = self.intern(name);
        let _ = name_ref; // natives print their own name, not via the intern table
        self.alloc_raw(ObjData::Native(NativeObj { name: name.into(), arity, function }))
    }

    pub fn alloc_closure(&mut self, function: ObjRef, upvalues: Vec<ObjRef>) -> ObjRef {
        self.alloc_raw(ObjData::Closure(ClosureObj { function, upvalues }))
    }

    pub fn alloc_open_upvalue(&mut self, slot: usize) -> ObjRef {
        self.alloc_raw(ObjData::Upvalue(UpvalueObj { state: UpvalueState::Open(slot) }))
    }

    pub fn alloc_class(&mut self, name: ObjRef) -> ObjRef {
        self.alloc_raw(ObjData::Class(ClassObj { name, methods: Table::new(), init: None }))
    }

    pub fn alloc_instance(&mut self, class: ObjRef) -> ObjRef {
        self.alloc_raw(ObjData::Instance(InstanceObj { class, fields: Table::new() }))
    }

    pub fn alloc_bound_method(&mut self, receiver: Value, method: ObjRef) -> ObjRef {
        self.alloc_raw(ObjData::BoundMethod(BoundMethodObj { receiver, method }))
    }

    // --- typed accessors --------------------------------------------------

    pub fn as_str(&self, r: ObjRef) -> &str {
        match &self.data(r) {
            ObjData::Str(s) => &s.value,
            _ => panic!("ObjRef does not refer to a string"),
        }
    }

    /// The precomputed FNV-1a hash of an interned string, for table
    /// lookups that already hold its `ObjRef` (globals, methods, fields).
    pub fn hash_of_str(&self, r: ObjRef) -> u32 {
        match &self.data(r) {
            ObjData::Str(s) => s.hash,
            _ => panic!("ObjRef does not refer to a string"),
        }
    }

    pub fn as_function(&self, r: ObjRef) -> &FunctionObj {
        match self.data(r) {
            ObjData::Function(f) => f,
            _ => panic!("ObjRef does not refer to a function"),
        }
    }

    pub fn as_function_mut(&mut self, r: ObjRef) -> &mut FunctionObj {
        match self.data_mut(r) {
            ObjData::Function(f) => f,
            _ => panic!("ObjRef does not refer to a function"),
        }
    }

    pub fn as_closure(&self, r: ObjRef) -> &ClosureObj {
        match self.data(r) {
            ObjData::Closure(c) => c,
            _ => panic!("ObjRef does not refer to a closure"),
        }
    }

    pub fn as_upvalue(&self, r: ObjRef) -> &UpvalueObj {
        match self.data(r) {
            ObjData::Upvalue(u) => u,
            _ => panic!("ObjRef does not refer to an upvalue"),
        }
    }

    pub fn as_upvalue_mut(&mut self, r: ObjRef) -> &mut UpvalueObj {
        match self.data_mut(r) {
            ObjData::Upvalue(u) => u,
            _ => panic!("ObjRef does not refer to an upvalue"),
        }
    }

    pub fn as_class(&self, r: ObjRef) -> &ClassObj {
        match self.data(r) {
            ObjData::Class(c) => c,
            _ => panic!("ObjRef does not refer to a class"),
        }
    }

    pub fn as_class_mut(&mut self, r: ObjRef) -> &mut ClassObj {
        match self.data_mut(r) {
            ObjData::Class(c) => c,
            _ => panic!("ObjRef does not refer to a class"),
        }
    }

    pub fn as_instance(&self, r: ObjRef) -> &InstanceObj {
        match self.data(r) {
            ObjData::Instance(i) => i,
            _ => panic!("ObjRef does not refer to an instance"),
        }
    }

    pub fn as_instance_mut(&mut self, r: ObjRef) -> &mut InstanceObj {
        match self.data_mut(r) {
            ObjData::Instance(i) => i,
            _ => panic!("ObjRef does not refer to an instance"),
        }
    }

    pub fn as_native(&self, r: ObjRef) -> &NativeObj {
        match self.data(r) {
            ObjData::Native(n) => n,
            _ => panic!("ObjRef does not refer to a native fn"),
        }
    }

    pub fn as_bound_method(&self, r: ObjRef) -> &BoundMethodObj {
        match self.data(r) {
            ObjData::BoundMethod(b) => b,
            _ => panic!("ObjRef does not refer to a bound method"),
        }
    }

    pub fn chunk(&self, r: ObjRef) -> &Chunk {
        &self.as_function(r).chunk
    }

    /// Renders a value for `print`/string conversion. Needs heap access
    /// because function/class/instance text mentions another object's name.
    pub fn stringify(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => crate::value::format_number(n),
            Value::Obj(r) => match self.data(r) {
                ObjData::Str(s) => s.value.to_string(),
                ObjData::Function(f) => match f.name {
                    Some(n) => format!("<fn {}>", self.as_str(n)),
                    None => "<script>".to_string(),
                },
                ObjData::Native(n) => format!("<native fn {}>", n.name),
                ObjData::Closure(c) => self.stringify(Value::Obj(c.function)),
                ObjData::Upvalue(_) => "<upvalue>".to_string(),
                ObjData::Class(c) => self.as_str(c.name).to_string(),
                ObjData::Instance(i) => format!("{} instance", self.as_str(self.as_class(i.class).name)),
                ObjData::BoundMethod(b) => self.stringify(Value::Obj(b.method)),
            },
        }
    }

    // --- garbage collection -----------------------------------------------

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(r) = value {
            self.mark_object(r);
        }
    }

    pub fn mark_object(&mut self, r: ObjRef) {
        if let Some(header) = self.slots[r.0].as_mut() {
            if header.marked {
                return;
            }
            header.marked = true;
            self.gray_stack.push(r);
        }
    }

    pub fn mark_table(&mut self, table: &Table) {
        for (key, value) in table.live_entries() {
            self.mark_object(key);
            self.mark_value(value);
        }
    }

    /// Walks one object's references, graying everything it points to.
    /// Children are collected into owned buffers *before* any `mark_*`
    /// call so the `&self.data(r)` borrow above is released first — the
    /// match and the marking never overlap in the borrow checker's eyes.
    fn blacken(&mut self, r: ObjRef) {
        let (vals, objs): (Vec<Value>, Vec<ObjRef>) = match self.data(r) {
            ObjData::Str(_) | ObjData::Native(_) => (Vec::new(), Vec::new()),
            ObjData::Function(f) => {
                let mut objs = Vec::new();
                if let Some(name) = f.name {
                    objs.push(name);
                }
                (f.chunk.constants.clone(), objs)
            }
            ObjData::Closure(c) => {
                let mut objs = vec![c.function];
                objs.extend(c.upvalues.iter().copied());
                (Vec::new(), objs)
            }
            ObjData::Upvalue(u) => match u.state {
                UpvalueState::Open(_) => (Vec::new(), Vec::new()),
                UpvalueState::Closed(v) => (vec![v], Vec::new()),
            },
            ObjData::Class(c) => {
                let entries = c.methods.live_entries();
                let mut objs: Vec<ObjRef> = entries.iter().map(|(k, _)| *k).collect();
                objs.push(c.name);
                let mut vals: Vec<Value> = entries.iter().map(|(_, v)| *v).collect();
                if let Some(init) = c.init {
                    vals.push(init);
                }
                (vals, objs)
            }
            ObjData::Instance(i) => {
                let entries = i.fields.live_entries();
                let mut objs: Vec<ObjRef> = entries.iter().map(|(k, _)| *k).collect();
                objs.push(i.class);
                let vals: Vec<Value> = entries.iter().map(|(_, v)| *v).collect();
                (vals, objs)
            }
            ObjData::BoundMethod(b) => (vec![b.receiver], vec![b.method]),
        };
        for v in vals {
            self.mark_value(v);
        }
        for o in objs {
            self.mark_object(o);
        }
    }

    fn trace_references(&mut self) {
        while let Some(r) = self.gray_stack.pop() {
            self.blacken(r);
        }
    }

    fn sweep(&mut self) {
        for idx in 0..self.slots.len() {
            if let Some(header) = self.slots[idx].as_mut() {
                if header.marked {
                    header.marked = false;
                } else {
                    self.bytes_allocated -= header.size;
                    self.slots[idx] = None;
                    self.free_list.push(idx);
                }
            }
        }
    }

    /// Runs a full collection cycle: trace from whatever the VM already
    /// marked as roots, drop unreachable interned strings, sweep, then
    /// grow the threshold. Callers are responsible for marking roots
    /// (the stack, call frames, open upvalues, globals, compiler state)
    /// before calling this.
    pub fn collect_garbage(&mut self) {
        self.trace_references();
        let slots = &self.slots;
        self.strings
            .remove_white(|r| matches!(&slots[r.0], Some(h) if h.marked));
        self.sweep();
        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;
    }
}

fn estimate_size(data: &ObjData) -> usize {
    use std::mem::size_of;
    match data {
        ObjData::Str(s) => size_of::<StrObj>() + s.value.len(),
        ObjData::Function(f) => {
            size_of::<FunctionObj>() + f.chunk.len() + f.chunk.constants.len() * size_of::<Value>()
        }
        ObjData::Native(_) => size_of::<NativeObj>(),
        ObjData::Closure(c) => size_of::<ClosureObj>() + c.upvalues.len() * size_of::<ObjRef>(),
        ObjData::Upvalue(_) => size_of::<UpvalueObj>(),
        ObjData::Class(_) => size_of::<ClassObj>(),
        ObjData::Instance(_) => size_of::<InstanceObj>(),
        ObjData::BoundMethod(_) => size_of::<BoundMethodObj>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_same_ref_for_equal_content() {
        let mut heap = Heap::new(false);
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn unreachable_objects_are_swept() {
        let mut heap = Heap::new(false);
        let r = heap.intern("orphan");
        assert!(heap.header(r).data_is_str());
        heap.collect_garbage();
        // Nothing marked it as a root, so it — and its intern entry — was
        // freed: its bytes are no longer accounted for, and the freed slot
        // goes onto the free list (`alloc_raw` may well recycle the same
        // index on the next allocation, so `r2 == r` is not itself proof of
        // anything; what matters is that it took a *new* allocation to get
        // there, i.e. the intern table no longer had "orphan" cached).
        assert_eq!(heap.bytes_allocated(), 0);
        let r2 = heap.intern("orphan");
        assert_eq!(heap.as_str(r2), "orphan");
        assert!(heap.bytes_allocated() > 0);
    }

    #[test]
    fn marked_root_survives_collection() {
        let mut heap = Heap::new(false);
        let r = heap.intern("kept");
        heap.mark_object(r);
        heap.collect_garbage();
        assert_eq!(heap.as_str(r), "kept");
    }

    impl ObjHeader {
        fn data_is_str(&self) -> bool {
            matches!(self.data, ObjData::Str(_))
        }
    }
}
