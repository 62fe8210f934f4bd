// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reusable formatting buffers.

use std::mem;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Mutex;
use std::sync::MutexGuard;

/// The default number of free buffers a pool retains.
pub const DEFAULT_POOL_CAPACITY: usize = 16;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// A bounded free list of byte buffers.
///
/// A buffer is either checked out, owned by a [`PooledBuffer`], or free, owned by the pool.
/// Buffers returned while the pool is full are dropped.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl BufferPool {
    /// Create a pool retaining at most `capacity` free buffers.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    fn free(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.free.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check out an empty buffer, reusing a free one if any.
    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self
            .free()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_BUFFER_CAPACITY));
        PooledBuffer { pool: self, buf }
    }

    /// Return a buffer to the pool.
    ///
    /// The buffer is cleared; it is dropped instead if the pool is already full.
    pub fn put(&self, mut buf: Vec<u8>) {
        let mut free = self.free();
        if free.len() < self.capacity {
            buf.clear();
            free.push(buf);
        }
    }

    /// The number of free buffers.
    pub fn len(&self) -> usize {
        self.free().len()
    }

    /// Whether the pool has no free buffer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of free buffers retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A buffer checked out of a [`BufferPool`], given back when dropped.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl PooledBuffer<'_> {
    /// Detach the buffer from its pool.
    pub fn into_inner(mut self) -> Vec<u8> {
        mem::take(&mut self.buf)
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        let buf = mem::take(&mut self.buf);
        // detached by `into_inner`
        if buf.capacity() > 0 {
            self.pool.put(buf);
        }
    }
}
