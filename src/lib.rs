// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
pub mod device;

pub mod resources;

pub mod vcd;

pub mod estimate;

pub mod report;
